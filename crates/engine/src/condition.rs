//! Condition expressions for `run_if` and `intervention_if` guards.
//!
//! The grammar is deliberately small:
//!
//! ```text
//! expr       := or_expr
//! or_expr    := and_expr ( "or" and_expr )*
//! and_expr   := unary ( "and" unary )*
//! unary      := "not" unary | comparison
//! comparison := operand ( ("==" | "!=" | "<" | "<=" | ">" | ">=") operand )?
//! operand    := $reference | 'string' | "string" | None | True | False
//!             | integer | float | bare-word
//! ```
//!
//! A bare comparison-less operand is tested for truthiness (empty strings,
//! zero, `null`, and empty collections are false). The tokenizer is
//! quote-aware, so keywords and operator characters inside quoted literals are
//! never mistaken for syntax. Type-mismatched ordering comparisons evaluate to
//! `false` rather than erroring; only malformed expressions return an error.

use serde_json::Value;

use crate::error::EngineError;
use crate::resolve::{ExecutionContext, resolve_reference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
    Op(CmpOp),
}

#[derive(Debug, Clone)]
enum Operand {
    Reference(String),
    Literal(Value),
}

#[derive(Debug, Clone)]
enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Not(Box<Expr>),
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    Truthy(Operand),
}

/// Evaluates a condition expression against the current run context.
///
/// Returns `Err` only when the expression itself is malformed; the caller
/// decides how to degrade (skip the step, or log and carry on).
pub fn evaluate_condition(
    expression: &str,
    context: &ExecutionContext,
) -> Result<bool, EngineError> {
    let expr = parse_expression(expression).map_err(|message| EngineError::Condition {
        expression: expression.to_string(),
        message,
    })?;
    Ok(eval(&expr, context))
}

fn parse_expression(expression: &str) -> Result<Expr, String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser { tokens, position: 0 };
    let expr = parser.or_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(extra) => Err(format!("unexpected input after expression: {extra:?}")),
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '\'' | '"' => {
                let quote = ch;
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => literal.push(c),
                        None => return Err(format!("unterminated {quote} quote")),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Op(CmpOp::Eq));
                } else {
                    return Err("expected '==' but found a single '='".to_string());
                }
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Op(CmpOp::Ne));
                } else {
                    return Err("expected '!=' but found a lone '!'".to_string());
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Op(CmpOp::Le));
                } else {
                    tokens.push(Token::Op(CmpOp::Lt));
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Op(CmpOp::Ge));
                } else {
                    tokens.push(Token::Op(CmpOp::Gt));
                }
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '=' | '!' | '<' | '>' | '\'' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(word)) if word == keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<Expr, String> {
        let first = self.and_expr()?;
        if !self.eat_keyword("or") {
            return Ok(first);
        }
        let mut parts = vec![first, self.and_expr()?];
        while self.eat_keyword("or") {
            parts.push(self.and_expr()?);
        }
        Ok(Expr::Or(parts))
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let first = self.unary()?;
        if !self.eat_keyword("and") {
            return Ok(first);
        }
        let mut parts = vec![first, self.unary()?];
        while self.eat_keyword("and") {
            parts.push(self.unary()?);
        }
        Ok(Expr::And(parts))
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let left = self.operand()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.position += 1;
            let right = self.operand()?;
            Ok(Expr::Compare { left, op, right })
        } else {
            Ok(Expr::Truthy(left))
        }
    }

    fn operand(&mut self) -> Result<Operand, String> {
        match self.next() {
            Some(Token::Str(literal)) => Ok(Operand::Literal(Value::String(literal))),
            Some(Token::Word(word)) => Ok(classify_word(word)),
            Some(Token::Op(op)) => Err(format!("expected a value before {op:?}")),
            None => Err("expected a value at end of expression".to_string()),
        }
    }
}

/// An unquoted word is a reference, a keyword literal, a number, or failing
/// all of those, a raw string.
fn classify_word(word: String) -> Operand {
    if word.starts_with('$') {
        return Operand::Reference(word);
    }
    match word.as_str() {
        "None" => return Operand::Literal(Value::Null),
        "True" => return Operand::Literal(Value::Bool(true)),
        "False" => return Operand::Literal(Value::Bool(false)),
        _ => {}
    }
    if let Ok(int) = word.parse::<i64>() {
        return Operand::Literal(Value::from(int));
    }
    if let Ok(float) = word.parse::<f64>() {
        return Operand::Literal(
            serde_json::Number::from_f64(float)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
    }
    Operand::Literal(Value::String(word))
}

fn eval(expr: &Expr, context: &ExecutionContext) -> bool {
    match expr {
        Expr::Or(parts) => parts.iter().any(|part| eval(part, context)),
        Expr::And(parts) => parts.iter().all(|part| eval(part, context)),
        Expr::Not(inner) => !eval(inner, context),
        Expr::Truthy(operand) => is_truthy(&resolve_operand(operand, context)),
        Expr::Compare { left, op, right } => compare(
            &resolve_operand(left, context),
            *op,
            &resolve_operand(right, context),
        ),
    }
}

fn resolve_operand(operand: &Operand, context: &ExecutionContext) -> Value {
    match operand {
        Operand::Reference(raw) => resolve_reference(raw, context).unwrap_or(Value::Null),
        Operand::Literal(value) => value.clone(),
    }
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> bool {
    match op {
        CmpOp::Eq => loose_eq(left, right),
        CmpOp::Ne => !loose_eq(left, right),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let Some(ordering) = loose_cmp(left, right) else {
                // ordering across incompatible types is simply false
                return false;
            };
            match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::Ge => ordering.is_ge(),
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            }
        }
    }
}

/// Equality with numeric coercion so `14 == 14.0` holds.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) if !left.is_boolean() && !right.is_boolean() => a == b,
        _ => left == right,
    }
}

fn loose_cmp(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_with(step_id: &str, output: Value) -> ExecutionContext {
        let mut context = ExecutionContext::new();
        context.insert(step_id, output);
        context
    }

    fn check(expression: &str, context: &ExecutionContext) -> bool {
        evaluate_condition(expression, context).expect("condition should parse")
    }

    #[test]
    fn numeric_comparisons() {
        let context = context_with("scan", json!({"level": 14.5}));
        assert!(check("$scan.level < 20", &context));
        assert!(check("$scan.level >= 14.5", &context));
        assert!(!check("$scan.level > 20", &context));
        assert!(check("$scan.level == 14.5", &context));
        assert!(check("$scan.level != 15", &context));
    }

    #[test]
    fn string_comparisons_and_quoting() {
        let context = context_with("scan", json!({"status": "CRITICAL_LOW"}));
        assert!(check("$scan.status == 'CRITICAL_LOW'", &context));
        assert!(check("$scan.status == CRITICAL_LOW", &context));
        assert!(check("$scan.status != \"NOMINAL\"", &context));
    }

    #[test]
    fn keywords_inside_quotes_are_literal_text() {
        let context = context_with("log", json!({"note": "fire and brimstone"}));
        assert!(check("$log.note == 'fire and brimstone'", &context));
    }

    #[test]
    fn boolean_connectives_and_precedence() {
        let context = context_with("scan", json!({"level": 14.5, "status": "LOW"}));
        assert!(check("$scan.level < 20 and $scan.status == 'LOW'", &context));
        assert!(check("$scan.level > 100 or $scan.status == 'LOW'", &context));
        // and binds tighter than or
        assert!(check(
            "$scan.level > 100 and $scan.status == 'LOW' or True",
            &context
        ));
        assert!(check("not $scan.level > 100", &context));
    }

    #[test]
    fn bare_operand_uses_truthiness() {
        let context = context_with("scan", json!({"alerts": [], "status": "LOW", "count": 0}));
        assert!(check("$scan.status", &context));
        assert!(!check("$scan.alerts", &context));
        assert!(!check("$scan.count", &context));
        assert!(!check("$scan.absent", &context));
        assert!(check("True", &context));
        assert!(!check("None", &context));
    }

    #[test]
    fn missing_reference_compares_against_none() {
        let context = ExecutionContext::new();
        assert!(check("$nowhere == None", &context));
        assert!(!check("$nowhere != None", &context));
    }

    #[test]
    fn mismatched_ordering_is_false_not_an_error() {
        let context = context_with("scan", json!({"status": "LOW"}));
        assert!(!check("$scan.status > 5", &context));
        assert!(!check("$scan.absent < 5", &context));
    }

    #[test]
    fn operators_without_spaces() {
        let context = context_with("scan", json!({"level": 3}));
        assert!(check("$scan.level>2", &context));
        assert!(check("$scan.level<=3", &context));
    }

    #[test]
    fn combined_range_check() {
        let mut context = ExecutionContext::new();
        context.insert("a", json!({"v": 10}));
        context.insert("b", json!({"v": 10}));
        assert!(check("$a.v > 5 and $b.v < 15", &context));

        let mut context = ExecutionContext::new();
        context.insert("a", json!({"v": 1}));
        context.insert("b", json!({"v": 10}));
        assert!(!check("$a.v > 5 and $b.v < 15", &context));
    }

    #[test]
    fn evaluation_is_pure_over_an_unchanged_context() {
        let context = context_with("scan", json!({"level": 14.5}));
        let expression = "$scan.level < 20 or $scan.level == None";
        assert_eq!(check(expression, &context), check(expression, &context));
        assert!(check(expression, &context));
    }

    #[test]
    fn malformed_expressions_error() {
        let context = ExecutionContext::new();
        assert!(evaluate_condition("", &context).is_err());
        assert!(evaluate_condition("   ", &context).is_err());
        assert!(evaluate_condition("$a == ", &context).is_err());
        assert!(evaluate_condition("$a = 1", &context).is_err());
        assert!(evaluate_condition("'unterminated", &context).is_err());
    }
}
