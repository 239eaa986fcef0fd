use thiserror::Error;

/// Client-side validation failures. These never reach the network and leave
/// the cart untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("Quantity must be a positive integer")]
    InvalidQuantity,

    #[error("Cannot take {requested}: current stock is {available}")]
    ExceedsStock { requested: i64, available: u32 },

    #[error("Lot {lot_code} was already added to the list")]
    DuplicateLot { lot_code: String },

    #[error("No lookup is active")]
    NoActiveLookup,

    #[error("Index {index} out of range for {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unknown line item: {id}")]
    UnknownItem { id: String },

    #[error("A commit is already in progress")]
    CommitInProgress,

    #[error("There are no items to save")]
    EmptyCart,

    #[error("Unit price is required and cannot be negative")]
    InvalidPrice,

    #[error("Lot expired on {caducidad}")]
    ExpiredLot { caducidad: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Field {field} is required")]
    MissingField { field: String },

    #[error("Invalid upload: {message}")]
    InvalidUpload { message: String },

    #[error("CPM must be a non-negative whole number")]
    InvalidCpm,

    #[error("Cart journal unavailable: {message}")]
    Store { message: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Rejected(#[from] RejectReason),

    #[error("Not found: {message}")]
    LookupNotFound { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Request timed out")]
    RequestTimedOut,

    #[error("Malformed response: {message}")]
    Malformed { message: String },
}

impl Error {
    /// Message meant for the operator. Server messages are passed through
    /// verbatim.
    pub fn operator_message(&self) -> String {
        match self {
            Error::Rejected(reason) => reason.to_string(),
            Error::LookupNotFound { message } => message.clone(),
            Error::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// True for failures the operator may simply retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Network { .. } | Error::RequestTimedOut | Error::Server { .. }
        )
    }
}
