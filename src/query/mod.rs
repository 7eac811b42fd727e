pub mod types;
pub mod error;

pub use error::ParseError;
pub use types::*;

/// Decode a raw request body into `QueryOptions`.
///
/// Missing `field` or `operator` keys and unknown operators surface as
/// `ParseError::Json` with serde's diagnostic; blank field names are rejected
/// here because serde accepts them.
pub fn parse(raw_body: &[u8]) -> Result<QueryOptions, ParseError> {
    let options: QueryOptions = serde_json::from_slice(raw_body)?;

    if let Some(index) = options.filters.iter().position(|f| f.field.trim().is_empty()) {
        return Err(ParseError::EmptyField { index });
    }
    if let Some(index) = options.order_by.iter().position(|o| o.field.trim().is_empty()) {
        return Err(ParseError::EmptyOrderField { index });
    }

    Ok(options)
}
