use std::sync::Arc;

use crate::services::presenter::BroadcastPresenter;
use crate::services::scanner::Scanner;

#[derive(Clone)]
pub struct AppState {
    pub scanner: Scanner,
    pub presenter: Arc<BroadcastPresenter>,
}
