//! Turns a condition string plus the live parameter store into a boolean.
//!
//! Pipeline:
//! 1. protect single-quoted literals behind a placeholder character,
//! 2. substitute parameter names with their literal text,
//! 3. normalize C-style operators into the engine syntax,
//! 4. restore the protected literals,
//! 5. evaluate; any failure yields `false`.
//!
//! Substitution in step 2 is plain substring replacement, applied in store
//! order (built-in categories, then user parameters). A name that is a
//! prefix of another name can therefore clobber it. This matches the
//! behaviour existing configuration documents were written against.

use tracing::{debug, warn};

use crate::core::expr::{self, ExprError};
use crate::core::store::ParameterStore;

/// Private-use character standing in for a protected literal.
const PLACEHOLDER: char = '\u{E000}';

/// Evaluate `expression` against `params`.
///
/// Parse or evaluation errors resolve to `false`. With `verbose`, failures
/// print the original and translated expression.
pub fn evaluate(expression: &str, params: &ParameterStore, verbose: bool) -> bool {
    let translated = match translate(expression, params) {
        Ok(translated) => translated,
        Err(err) => {
            warn!(expression, error = %err, "condition could not be translated");
            if verbose {
                println!("Expression could not be evaluated: {err}");
                println!("  original:   {expression}");
            }
            return false;
        }
    };
    match evaluate_translated(&translated) {
        Ok(result) => {
            debug!(expression, translated = %translated, result, "condition evaluated");
            result
        }
        Err(err) => {
            warn!(expression, translated = %translated, error = %err, "condition evaluation failed");
            if verbose {
                println!("Expression could not be evaluated: {err}");
                println!("  original:   {expression}");
                println!("  translated: {translated}");
            }
            false
        }
    }
}

/// Steps 1-4 of the pipeline: the text handed to the expression engine.
///
/// Fails when a referenced parameter has no literal form.
pub fn translate(expression: &str, params: &ParameterStore) -> Result<String, ExprError> {
    let (mut text, literals) = protect_literals(expression);
    for param in params.substitution_order() {
        if text.contains(param.name()) {
            let literal = param
                .value()
                .expression_literal()
                .ok_or_else(|| ExprError::NoLiteral(param.name().to_string()))?;
            text = text.replace(param.name(), &literal);
        }
    }
    let text = normalize_operators(&text);
    Ok(restore_literals(&text, &literals))
}

fn evaluate_translated(translated: &str) -> Result<bool, ExprError> {
    expr::evaluate(translated)?.to_bool()
}

/// Replace every `'...'` span with [`PLACEHOLDER`], returning the spans in order.
///
/// An unmatched trailing quote is left in place.
fn protect_literals(expression: &str) -> (String, Vec<String>) {
    let mut text = String::with_capacity(expression.len());
    let mut literals = Vec::new();
    let mut rest = expression;
    while let Some(open) = rest.find('\'') {
        let Some(len) = rest[open + 1..].find('\'') else {
            break;
        };
        let close = open + 1 + len;
        text.push_str(&rest[..open]);
        text.push(PLACEHOLDER);
        literals.push(rest[open..=close].to_string());
        rest = &rest[close + 1..];
    }
    text.push_str(rest);
    (text, literals)
}

fn normalize_operators(text: &str) -> String {
    text.replace("!=", "<>")
        .replace("==", "=")
        .replace("&&", " and ")
        .replace("||", " or ")
        .replace('!', " not ")
}

fn restore_literals(text: &str, literals: &[String]) -> String {
    let mut restored = String::with_capacity(text.len());
    let mut pending = literals.iter();
    for ch in text.chars() {
        if ch == PLACEHOLDER {
            match pending.next() {
                Some(literal) => restored.push_str(literal),
                None => restored.push(ch),
            }
        } else {
            restored.push(ch);
        }
    }
    restored
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::core::param::{Category, ParamValue, Parameter};
    use crate::core::store::names;

    fn store_with(tokens: &[&str]) -> ParameterStore {
        let mut store = ParameterStore::default();
        for token in tokens {
            assert!(store.register_user(Parameter::parse(token).expect("token")));
        }
        store
    }

    #[test]
    fn quoted_operators_survive_normalization() {
        let store = ParameterStore::default();
        assert!(evaluate("'A==B' == 'A==B'", &store, false));
        assert_eq!(
            translate("'A==B' == 'A==B'", &store).as_deref(),
            Ok("'A==B' = 'A==B'")
        );
    }

    #[test]
    fn c_style_operators_are_normalized() {
        let store = ParameterStore::default();
        assert_eq!(
            translate("1 != 2 && !(1 == 2) || false", &store).as_deref(),
            Ok("1 <> 2  and   not (1 = 2)  or  false")
        );
        assert!(evaluate("1 != 2 && !(1 == 2) || false", &store, false));
    }

    #[test]
    fn parameters_are_substituted_by_type() {
        let store = store_with(&[
            "p:n:Retries:3",
            "p:b:Enabled:true",
            "p:s:Mode:fast",
            "p:d:Deadline:2030-01-01",
        ]);
        assert!(evaluate("Retries > 2 && Enabled", &store, false));
        assert!(evaluate("Mode == 'fast'", &store, false));
        assert!(evaluate("Deadline > SYSTEM_TIME_START", &store, false));
        assert_eq!(translate("Mode", &store).as_deref(), Ok("'fast'"));
    }

    #[test]
    fn system_parameters_are_visible() {
        let mut store = ParameterStore::default();
        store.update_system(names::TASK_SUCCESS_COUNT, ParamValue::Number(2.0));
        assert!(evaluate("TASK_SUCCESS_COUNT = 2", &store, false));
        assert_eq!(
            store.get(names::ENV_MAX_TASK_ITERATIONS, Category::Environment).value(),
            &ParamValue::Number(10.0)
        );
        assert!(evaluate("ENV_MAX_TASK_ITERATIONS >= 10", &store, false));
    }

    #[test]
    fn built_in_names_do_not_clobber_each_other() {
        let mut store = ParameterStore::default();
        store.update_system(names::TASK_NAME, ParamValue::String("outer".into()));
        store.update_system(names::SUBTASK_NAME, ParamValue::String("inner".into()));
        store.update_system(names::TASK_LAST_SUCCESS_PARTIAL, ParamValue::Boolean(true));
        assert!(evaluate("SUBTASK_NAME == 'inner' && TASK_NAME == 'outer'", &store, false));
        assert!(evaluate("TASK_LAST_SUCCESS_PARTIAL && !TASK_LAST_SUCCESS", &store, false));
    }

    #[test]
    fn substitution_is_plain_substring_replacement() {
        // `Count` is replaced inside `CountLimit` before `CountLimit` itself is seen.
        let store = store_with(&["p:n:Count:1", "p:n:CountLimit:5"]);
        assert_eq!(
            translate("Count < CountLimit", &store).as_deref(),
            Ok("1 < 1Limit")
        );
        assert!(!evaluate("Count < CountLimit", &store, false));
    }

    #[test]
    fn malformed_expressions_are_false() {
        let store = ParameterStore::default();
        assert!(!evaluate("", &store, false));
        assert!(!evaluate("1 +", &store, false));
        assert!(!evaluate("UNKNOWN_PARAM = 1", &store, false));
        assert!(!evaluate("'text'", &store, false));
    }

    #[test]
    fn runaway_nesting_is_false() {
        let store = ParameterStore::default();
        let parens = format!("{}1 = 1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(!evaluate(&parens, &store, false));
        assert!(!evaluate(&format!("{}false", "!".repeat(10_000)), &store, false));
    }

    #[test]
    fn timestamps_without_tick_form_are_false() {
        let far = NaiveDate::from_ymd_opt(30_000, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date");
        let mut store = ParameterStore::default();
        store.update_system(names::SYSTEM_TIME_CURRENT, ParamValue::Timestamp(far));

        assert_eq!(
            translate("SYSTEM_TIME_CURRENT > 0", &store),
            Err(ExprError::NoLiteral(names::SYSTEM_TIME_CURRENT.to_string()))
        );
        assert!(!evaluate("SYSTEM_TIME_CURRENT > 0", &store, false));
        // Expressions that never mention it are unaffected.
        assert!(evaluate("1 < 2", &store, false));
    }

    #[test]
    fn unmatched_quote_is_left_alone() {
        let (text, literals) = protect_literals("'a' = 'b");
        assert_eq!(literals, vec!["'a'".to_string()]);
        assert_eq!(text, format!("{PLACEHOLDER} = 'b"));
    }
}
