use crate::checkout::Checkout;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub checkout: Checkout,
}

impl AppState {
    pub fn new(checkout: Checkout) -> Self {
        Self { checkout }
    }
}
