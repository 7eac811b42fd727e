use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Filter {index} has an empty field name")]
    EmptyField { index: usize },

    #[error("order_by entry {index} has an empty field name")]
    EmptyOrderField { index: usize },
}
