use std::sync::Arc;

use gridsmith_algo::{AnalyticsProvider, LocalProvider, ProviderRegistry};
use gridsmith_core::{FallbackParams, GridResult, LinearSystemBackend, Metadata};
use gridsmith_viz::PlotRenderer;

/// Capabilities injected into every pipeline run.
///
/// Holds the external providers (tried in registration order), an optional
/// figure renderer and an optional dense solver for the local fits. Without a
/// renderer, figures are written as plot-metadata JSON; without a solver the
/// local provider uses faer.
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub providers: ProviderRegistry,
    pub renderer: Option<Arc<dyn PlotRenderer>>,
    pub solver: Option<Arc<dyn LinearSystemBackend>>,
}

impl PipelineContext {
    /// No providers and no renderer: local computations and metadata figures only.
    pub fn local_only() -> Self {
        Self::default()
    }

    /// No providers, PNG figures via the bitmap renderer.
    #[cfg(feature = "render")]
    pub fn with_bitmap_renderer() -> Self {
        Self::default().with_renderer(Arc::new(gridsmith_viz::BitmapRenderer::default()))
    }

    pub fn with_provider(mut self, provider: Arc<dyn AnalyticsProvider>) -> Self {
        self.providers.register(provider);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PlotRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Solver for the local regression and ARIMA fits.
    pub fn with_solver(mut self, solver: Arc<dyn LinearSystemBackend>) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn renderer(&self) -> Option<&dyn PlotRenderer> {
        self.renderer.as_deref()
    }

    /// Local fallback configured from a run's metadata.
    pub fn local_provider(&self, metadata: &Metadata) -> GridResult<LocalProvider> {
        let local = LocalProvider::new(FallbackParams::from_metadata(metadata)?);
        Ok(match &self.solver {
            Some(solver) => local.with_backend(Arc::clone(solver)),
            None => local,
        })
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("providers", &self.providers)
            .field("renderer", &self.renderer.as_ref().map(|r| r.id().to_string()))
            .field("custom_solver", &self.solver.is_some())
            .finish()
    }
}
