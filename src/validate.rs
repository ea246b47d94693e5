//! Field-level draft validation, applied before any mutation touches the
//! network. Messages are part of the user-facing contract; keep them stable.

use thiserror::Error;

use crate::model::ProductDraft;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// All failing fields of one draft, in field order. Stock carries no rule
/// here: non-negativity and integrality are enforced by its type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid product: {}", join_messages(.0))]
pub struct ValidationError(pub Vec<FieldError>);

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check a full draft and collect every field failure. At most one message
/// per field; for title the emptiness rule wins over the length rule.
pub fn validate_draft(draft: &ProductDraft) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    if draft.title.is_empty() {
        errors.push(FieldError {
            field: "title",
            message: "Product name is required",
        });
    } else if draft.title.chars().count() < 3 {
        errors.push(FieldError {
            field: "title",
            message: "Product name must be at least 3 characters",
        });
    }

    if draft.category.is_empty() {
        errors.push(FieldError {
            field: "category",
            message: "Category is required",
        });
    }

    // A CLI-parsed float can smuggle in NaN or an infinity; neither has a
    // JSON representation, so both fail here rather than on the wire.
    if !draft.price.is_finite() || draft.price < 0.0 {
        errors.push(FieldError {
            field: "price",
            message: "Price must be positive",
        });
    }

    if draft.description.is_empty() {
        errors.push(FieldError {
            field: "description",
            message: "Description is required",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            title: "Widget".into(),
            description: "A widget".into(),
            category: "tools".into(),
            price: 4.5,
            stock: 12,
        }
    }

    #[test]
    fn complete_draft_passes() {
        assert!(validate_draft(&draft()).is_ok());
    }

    #[test]
    fn empty_draft_collects_every_failing_field() {
        let empty = ProductDraft {
            title: String::new(),
            description: String::new(),
            category: String::new(),
            price: 0.0,
            stock: 0,
        };
        let err = validate_draft(&empty).unwrap_err();
        let fields: Vec<&str> = err.0.iter().map(|e| e.field).collect();
        // Zero price and zero stock are fine; the strings are not.
        assert_eq!(fields, vec!["title", "category", "description"]);
        assert_eq!(err.0[0].message, "Product name is required");
    }

    #[test]
    fn short_title_gets_the_length_message() {
        let short = ProductDraft {
            title: "ab".into(),
            ..draft()
        };
        let err = validate_draft(&short).unwrap_err();
        assert_eq!(err.0.len(), 1);
        assert_eq!(err.0[0].message, "Product name must be at least 3 characters");
    }

    #[test]
    fn negative_and_non_finite_prices_are_rejected() {
        let negative = ProductDraft {
            price: -0.01,
            ..draft()
        };
        let err = validate_draft(&negative).unwrap_err();
        assert_eq!(err.0[0].message, "Price must be positive");

        let nan = ProductDraft {
            price: f64::NAN,
            ..draft()
        };
        assert!(validate_draft(&nan).is_err());

        // serde_json would turn these into null on the wire.
        let infinite = ProductDraft {
            price: f64::INFINITY,
            ..draft()
        };
        let err = validate_draft(&infinite).unwrap_err();
        assert_eq!(err.0[0].message, "Price must be positive");
        assert!(validate_draft(&ProductDraft {
            price: f64::NEG_INFINITY,
            ..draft()
        })
        .is_err());

        let zero = ProductDraft {
            price: 0.0,
            ..draft()
        };
        assert!(validate_draft(&zero).is_ok());
    }

    #[test]
    fn error_message_lists_field_and_rule() {
        let err = validate_draft(&ProductDraft {
            title: "ab".into(),
            category: String::new(),
            ..draft()
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid product: title: Product name must be at least 3 characters; category: Category is required"
        );
    }
}
