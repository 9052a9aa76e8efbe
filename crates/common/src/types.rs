use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares an opaque string identifier.
///
/// Identifiers cross service boundaries as plain strings, so the newtype
/// only exists to stop a customer ID from being passed where an order ID
/// is expected.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is empty or only whitespace.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }

            /// Consumes the identifier, returning the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Declares a generator for identifiers minted by this system.
macro_rules! generated_id {
    ($name:ident, $prefix:literal) => {
        impl $name {
            /// Generates a fresh, globally unique identifier.
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "-{}"), Uuid::new_v4().simple()))
            }
        }
    };
}

string_id!(
    /// Identifier of a customer record owned by the customer service.
    CustomerId
);

string_id!(
    /// Identifier (SKU) of a product record owned by the product service.
    ProductId
);

string_id!(
    /// Identifier of an order, assigned when the order is first persisted.
    OrderId
);

string_id!(
    /// Identifier of a payment, assigned by the payment gateway.
    PaymentId
);

string_id!(
    /// Identifier of a ledger transaction. Distinct from the payment ID it records.
    TransactionId
);

generated_id!(OrderId, "ORDER");
generated_id!(PaymentId, "PAY");
generated_id!(TransactionId, "TXN");
