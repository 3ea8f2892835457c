//! # Validation Module
//!
//! Input rules checked before anything touches storage.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request layer                                                │
//! │  └── Parameter parsing, already-typed arguments                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Store / credential operations                                │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE constraints (username, product name, cart item pair)       │
//! │  ├── CHECK (quantity > 0)                                              │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use storefront_core::validation::{validate_password, validate_quantity};
//!
//! assert!(validate_password("password123").is_ok());
//! assert!(validate_password("short").is_err());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::ShippingInfo;
use crate::MIN_PASSWORD_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_USERNAME_LENGTH: usize = 64;
const MAX_NAME_LENGTH: usize = 200;

// =============================================================================
// Credential Validators
// =============================================================================

/// Validates a username.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most 64 characters
/// - No surrounding whitespace (usernames are compared exactly)
pub fn validate_username(username: &str) -> ValidationResult<()> {
    if username.trim().is_empty() {
        return Err(ValidationError::required("username"));
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: MAX_USERNAME_LENGTH,
        });
    }

    if username.trim() != username {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must not start or end with whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a password candidate at registration.
///
/// Length is counted in characters, not bytes.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LENGTH,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart item quantity.
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(-3).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
pub fn validate_price_cents(price_cents: i64) -> ValidationResult<()> {
    if price_cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price_cents".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Catalog Validators
// =============================================================================

fn validate_display_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

/// Validates a product name.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_display_name("name", name)
}

/// Validates a category name.
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    validate_display_name("category", name)
}

// =============================================================================
// Checkout Validators
// =============================================================================

/// Validates an email address (just the shape, not deliverability).
pub fn validate_email(field: &str, email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::required(field));
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected name@domain".to_string(),
        }),
    }
}

/// Validates the shipping block submitted at checkout.
///
/// Every field except the second address line is required.
pub fn validate_shipping(shipping: &ShippingInfo) -> ValidationResult<()> {
    let required = [
        ("ship_name", &shipping.ship_name),
        ("ship_address", &shipping.ship_address),
        ("city", &shipping.city),
        ("state", &shipping.state),
        ("zip", &shipping.zip),
    ];

    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ValidationError::required(field));
        }
    }

    validate_email("email", &shipping.email)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            ship_name: "Alice Liddell".to_string(),
            ship_address: "1 Rabbit Hole".to_string(),
            ship_address2: None,
            city: "Oxford".to_string(),
            state: "OX".to_string(),
            zip: "12345".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(matches!(
            validate_username("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_username(" alice").is_err());
        assert!(validate_username(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_password_min_length() {
        assert!(validate_password("123456").is_ok());
        assert!(matches!(
            validate_password("12345"),
            Err(ValidationError::TooShort { min: 6, .. })
        ));
        assert!(matches!(
            validate_password(""),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_password_counts_chars() {
        // Five characters, ten bytes.
        assert!(validate_password("ééééé").is_err());
        assert!(validate_password("éééééé").is_ok());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(500).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1999).is_ok());
        assert!(validate_price_cents(-1).is_err());
    }

    #[test]
    fn test_validate_catalog_names() {
        assert!(validate_product_name("Teapot").is_ok());
        assert!(validate_product_name("").is_err());
        assert_eq!(
            validate_category_name(" ").unwrap_err().field(),
            "category"
        );
    }

    #[test]
    fn test_validate_shipping() {
        assert!(validate_shipping(&shipping()).is_ok());

        let mut missing_city = shipping();
        missing_city.city = String::new();
        assert_eq!(validate_shipping(&missing_city).unwrap_err().field(), "city");

        let mut bad_email = shipping();
        bad_email.email = "alice".to_string();
        assert!(matches!(
            validate_shipping(&bad_email),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }
}
