use crate::config::Config;
use crate::workflow::Workflow;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<Workflow>,
    pub config: Arc<Config>,
}
