//! Engine context shared by every request.
//!
//! Built once by `lifecycle::startup` and passed to handlers as
//! `Arc<AppContext>`. Nothing in here is mutated after boot except the
//! process caches (match memo, meta tier, template memo), which are
//! idempotent and may be cleared.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::delivery::attachment::AttachmentIndex;
use crate::delivery::static_files::CachedDelivery;
use crate::delivery::transcode::ImageTranscoder;
use crate::http::dispatcher::Dispatcher;
use crate::routing::matcher::Matcher;
use crate::routing::resolver::MetaResolver;
use crate::routing::table::RouteTable;
use crate::security::policy::PolicyEnforcer;
use crate::services::{Authenticator, OptionsStore, PersistentCache};
use crate::theme::render::ThemeRenderer;

pub struct AppContext {
    pub config: AppConfig,
    pub table: Arc<RouteTable>,
    pub matcher: Matcher,
    pub resolver: MetaResolver,
    pub policy: PolicyEnforcer,
    pub dispatcher: Dispatcher,
    pub theme: ThemeRenderer,
    pub delivery: CachedDelivery,
    pub transcoder: ImageTranscoder,
    pub attachments: Arc<dyn AttachmentIndex>,
    pub auth: Arc<dyn Authenticator>,
    pub options: Arc<dyn OptionsStore>,
    pub cache: Arc<dyn PersistentCache>,
}

impl AppContext {
    /// Drop every in-process cache. Persistent entries expire on their own.
    pub fn clear_caches(&self) {
        self.matcher.clear();
        self.resolver.clear();
        self.theme.clear();
        tracing::info!("Process caches cleared");
    }

    pub fn verbose_errors(&self) -> bool {
        self.config.debug.verbose_errors
    }
}
