use std::fmt;

use thiserror::Error;

use pep440_rs::Version;

/// One of the environment variables PEP 508 markers may reference.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MarkerVar {
    /// `python_version`, e.g. `"3.8"` — major.minor only.
    PythonVersion,
    /// `python_full_version`, e.g. `"3.8.10"`.
    PythonFullVersion,
    /// `os_name`, e.g. `"posix"`.
    OsName,
    /// `sys_platform`, e.g. `"linux"`.
    SysPlatform,
    /// `platform_machine`, e.g. `"x86_64"`.
    PlatformMachine,
    /// `platform_python_implementation`, e.g. `"CPython"`.
    PlatformPythonImplementation,
    /// `platform_release`.
    PlatformRelease,
    /// `platform_system`, e.g. `"Linux"`.
    PlatformSystem,
    /// `platform_version`.
    PlatformVersion,
    /// `implementation_name`, e.g. `"cpython"`.
    ImplementationName,
    /// `implementation_version`.
    ImplementationVersion,
    /// `extra`, bound per-evaluation rather than read from the environment.
    Extra,
}

impl MarkerVar {
    fn from_identifier(s: &str) -> Option<Self> {
        Some(match s {
            "python_version" => Self::PythonVersion,
            "python_full_version" => Self::PythonFullVersion,
            "os_name" => Self::OsName,
            "sys_platform" => Self::SysPlatform,
            "platform_machine" => Self::PlatformMachine,
            "platform_python_implementation" | "platform.python_implementation" => {
                Self::PlatformPythonImplementation
            }
            "platform_release" => Self::PlatformRelease,
            "platform_system" => Self::PlatformSystem,
            "platform_version" => Self::PlatformVersion,
            "implementation_name" => Self::ImplementationName,
            "implementation_version" => Self::ImplementationVersion,
            "extra" => Self::Extra,
            _ => return None,
        })
    }

    /// Whether comparisons against this variable should use PEP 440 version ordering rather
    /// than plain string ordering.
    fn is_version_like(self) -> bool {
        matches!(
            self,
            Self::PythonVersion | Self::PythonFullVersion | Self::ImplementationVersion
        )
    }
}

/// The resolved value of every marker environment variable except `extra`, which is supplied
/// per-evaluation since it depends on which optional feature is being considered.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct MarkerEnvironment {
    /// `python_version`
    pub python_version: String,
    /// `python_full_version`
    pub python_full_version: String,
    /// `os_name`
    pub os_name: String,
    /// `sys_platform`
    pub sys_platform: String,
    /// `platform_machine`
    pub platform_machine: String,
    /// `platform_python_implementation`
    pub platform_python_implementation: String,
    /// `platform_release`
    pub platform_release: String,
    /// `platform_system`
    pub platform_system: String,
    /// `platform_version`
    pub platform_version: String,
    /// `implementation_name`
    pub implementation_name: String,
    /// `implementation_version`
    pub implementation_version: String,
}

impl MarkerEnvironment {
    fn get(&self, var: MarkerVar) -> &str {
        match var {
            MarkerVar::PythonVersion => &self.python_version,
            MarkerVar::PythonFullVersion => &self.python_full_version,
            MarkerVar::OsName => &self.os_name,
            MarkerVar::SysPlatform => &self.sys_platform,
            MarkerVar::PlatformMachine => &self.platform_machine,
            MarkerVar::PlatformPythonImplementation => &self.platform_python_implementation,
            MarkerVar::PlatformRelease => &self.platform_release,
            MarkerVar::PlatformSystem => &self.platform_system,
            MarkerVar::PlatformVersion => &self.platform_version,
            MarkerVar::ImplementationName => &self.implementation_name,
            MarkerVar::ImplementationVersion => &self.implementation_version,
            MarkerVar::Extra => "",
        }
    }
}

/// One side of a marker expression: either an environment variable or a quoted string literal.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum MarkerValue {
    /// A bare identifier such as `python_version`.
    Variable(MarkerVar),
    /// A quoted string literal such as `"3.8"`.
    Literal(String),
}

/// A marker comparison operator.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MarkerOperator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

/// A single `lhs OP rhs` marker comparison.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct MarkerExpression {
    /// The left-hand side.
    pub l_value: MarkerValue,
    /// The comparison operator.
    pub operator: MarkerOperator,
    /// The right-hand side.
    pub r_value: MarkerValue,
}

impl MarkerExpression {
    fn resolve(value: &MarkerValue, env: &MarkerEnvironment, extra: &str) -> String {
        match value {
            MarkerValue::Literal(s) => s.clone(),
            MarkerValue::Variable(MarkerVar::Extra) => extra.to_string(),
            MarkerValue::Variable(var) => env.get(*var).to_string(),
        }
    }

    fn is_version_like(value: &MarkerValue) -> bool {
        matches!(value, MarkerValue::Variable(var) if var.is_version_like())
    }

    /// Evaluate this single comparison.
    pub fn evaluate(&self, env: &MarkerEnvironment, extra: &str) -> bool {
        let lhs = Self::resolve(&self.l_value, env, extra);
        let rhs = Self::resolve(&self.r_value, env, extra);

        match self.operator {
            MarkerOperator::In => return rhs.contains(&lhs),
            MarkerOperator::NotIn => return !rhs.contains(&lhs),
            _ => {}
        }

        let use_versions = Self::is_version_like(&self.l_value) || Self::is_version_like(&self.r_value);
        if use_versions {
            if let (Ok(lv), Ok(rv)) = (lhs.parse::<Version>(), rhs.parse::<Version>()) {
                return match self.operator {
                    MarkerOperator::Equal => lv == rv,
                    MarkerOperator::NotEqual => lv != rv,
                    MarkerOperator::LessThan => lv < rv,
                    MarkerOperator::LessThanEqual => lv <= rv,
                    MarkerOperator::GreaterThan => lv > rv,
                    MarkerOperator::GreaterThanEqual => lv >= rv,
                    MarkerOperator::In | MarkerOperator::NotIn => unreachable!(),
                };
            }
        }

        match self.operator {
            MarkerOperator::Equal => lhs == rhs,
            MarkerOperator::NotEqual => lhs != rhs,
            MarkerOperator::LessThan => lhs < rhs,
            MarkerOperator::LessThanEqual => lhs <= rhs,
            MarkerOperator::GreaterThan => lhs > rhs,
            MarkerOperator::GreaterThanEqual => lhs >= rhs,
            MarkerOperator::In | MarkerOperator::NotIn => unreachable!(),
        }
    }
}

/// A nested and/or tree of marker expressions, e.g. `python_version >= "3.8" and extra == "dev"`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum MarkerTree {
    /// A leaf comparison.
    Expression(MarkerExpression),
    /// A conjunction; empty is vacuously true.
    And(Vec<MarkerTree>),
    /// A disjunction; empty is vacuously false.
    Or(Vec<MarkerTree>),
}

impl MarkerTree {
    /// Evaluate the tree against an environment, with `extra` bound for any `extra` variable
    /// reference.
    pub fn evaluate(&self, env: &MarkerEnvironment, extra: &str) -> bool {
        match self {
            Self::Expression(expr) => expr.evaluate(env, extra),
            Self::And(parts) => parts.iter().all(|part| part.evaluate(env, extra)),
            Self::Or(parts) => parts.iter().any(|part| part.evaluate(env, extra)),
        }
    }
}

impl fmt::Display for MarkerTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn value_fmt(value: &MarkerValue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match value {
                MarkerValue::Literal(s) => write!(f, "\"{s}\""),
                MarkerValue::Variable(var) => write!(f, "{}", var_name(*var)),
            }
        }
        fn var_name(var: MarkerVar) -> &'static str {
            match var {
                MarkerVar::PythonVersion => "python_version",
                MarkerVar::PythonFullVersion => "python_full_version",
                MarkerVar::OsName => "os_name",
                MarkerVar::SysPlatform => "sys_platform",
                MarkerVar::PlatformMachine => "platform_machine",
                MarkerVar::PlatformPythonImplementation => "platform_python_implementation",
                MarkerVar::PlatformRelease => "platform_release",
                MarkerVar::PlatformSystem => "platform_system",
                MarkerVar::PlatformVersion => "platform_version",
                MarkerVar::ImplementationName => "implementation_name",
                MarkerVar::ImplementationVersion => "implementation_version",
                MarkerVar::Extra => "extra",
            }
        }
        fn op_str(op: MarkerOperator) -> &'static str {
            match op {
                MarkerOperator::Equal => "==",
                MarkerOperator::NotEqual => "!=",
                MarkerOperator::LessThan => "<",
                MarkerOperator::LessThanEqual => "<=",
                MarkerOperator::GreaterThan => ">",
                MarkerOperator::GreaterThanEqual => ">=",
                MarkerOperator::In => "in",
                MarkerOperator::NotIn => "not in",
            }
        }
        match self {
            Self::Expression(expr) => {
                value_fmt(&expr.l_value, f)?;
                write!(f, " {} ", op_str(expr.operator))?;
                value_fmt(&expr.r_value, f)
            }
            Self::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i != 0 {
                        f.write_str(" and ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Self::Or(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i != 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "({part})")?;
                }
                Ok(())
            }
        }
    }
}

/// Error parsing a marker expression.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("invalid marker expression at offset {offset}: {reason}")]
pub struct MarkerParseError {
    reason: String,
    offset: usize,
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_ws(&mut self) {
        while self.input[self.pos..].starts_with(|c: char| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn err(&self, reason: impl Into<String>) -> MarkerParseError {
        MarkerParseError {
            reason: reason.into(),
            offset: self.pos,
        }
    }

    fn eat_literal(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn parse_value(&mut self) -> Result<MarkerValue, MarkerParseError> {
        self.skip_ws();
        let rest = self.rest();
        if let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') {
            let body_start = self.pos + 1;
            let end = self.input[body_start..]
                .find(quote)
                .ok_or_else(|| self.err("unterminated string literal"))?;
            let literal = self.input[body_start..body_start + end].to_string();
            self.pos = body_start + end + 1;
            return Ok(MarkerValue::Literal(literal));
        }
        let ident_end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(rest.len());
        if ident_end == 0 {
            return Err(self.err("expected a quoted string or marker variable name"));
        }
        let ident = &rest[..ident_end];
        let var = MarkerVar::from_identifier(ident)
            .ok_or_else(|| self.err(format!("unknown marker variable `{ident}`")))?;
        self.pos += ident_end;
        Ok(MarkerValue::Variable(var))
    }

    fn parse_operator(&mut self) -> Result<MarkerOperator, MarkerParseError> {
        self.skip_ws();
        if self.eat_literal("==") {
            return Ok(MarkerOperator::Equal);
        }
        if self.eat_literal("!=") {
            return Ok(MarkerOperator::NotEqual);
        }
        if self.eat_literal("<=") {
            return Ok(MarkerOperator::LessThanEqual);
        }
        if self.eat_literal(">=") {
            return Ok(MarkerOperator::GreaterThanEqual);
        }
        if self.eat_literal("<") {
            return Ok(MarkerOperator::LessThan);
        }
        if self.eat_literal(">") {
            return Ok(MarkerOperator::GreaterThan);
        }
        if self.eat_literal("not") {
            self.skip_ws();
            if !self.eat_literal("in") {
                return Err(self.err("expected `in` after `not`"));
            }
            return Ok(MarkerOperator::NotIn);
        }
        if self.eat_literal("in") {
            return Ok(MarkerOperator::In);
        }
        Err(self.err("expected a comparison operator"))
    }

    fn parse_expression(&mut self) -> Result<MarkerTree, MarkerParseError> {
        let l_value = self.parse_value()?;
        let operator = self.parse_operator()?;
        let r_value = self.parse_value()?;
        Ok(MarkerTree::Expression(MarkerExpression {
            l_value,
            operator,
            r_value,
        }))
    }

    fn parse_atom(&mut self) -> Result<MarkerTree, MarkerParseError> {
        self.skip_ws();
        if self.eat_literal("(") {
            let inner = self.parse_or()?;
            self.skip_ws();
            if !self.eat_literal(")") {
                return Err(self.err("expected `)`"));
            }
            return Ok(inner);
        }
        self.parse_expression()
    }

    fn parse_and(&mut self) -> Result<MarkerTree, MarkerParseError> {
        let mut parts = vec![self.parse_atom()?];
        loop {
            let checkpoint = self.pos;
            self.skip_ws();
            if self.eat_literal("and") {
                parts.push(self.parse_atom()?);
            } else {
                self.pos = checkpoint;
                break;
            }
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            MarkerTree::And(parts)
        })
    }

    fn parse_or(&mut self) -> Result<MarkerTree, MarkerParseError> {
        let mut parts = vec![self.parse_and()?];
        loop {
            let checkpoint = self.pos;
            self.skip_ws();
            if self.eat_literal("or") {
                parts.push(self.parse_and()?);
            } else {
                self.pos = checkpoint;
                break;
            }
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            MarkerTree::Or(parts)
        })
    }
}

/// Parse a marker expression, the part of a requirement following `;`.
pub fn parse_marker(input: &str) -> Result<MarkerTree, MarkerParseError> {
    let mut tokenizer = Tokenizer::new(input);
    let tree = tokenizer.parse_or()?;
    tokenizer.skip_ws();
    if !tokenizer.rest().is_empty() {
        return Err(tokenizer.err("trailing input after marker expression"));
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> MarkerEnvironment {
        MarkerEnvironment {
            python_version: "3.10".to_string(),
            python_full_version: "3.10.4".to_string(),
            os_name: "posix".to_string(),
            sys_platform: "linux".to_string(),
            platform_machine: "x86_64".to_string(),
            platform_python_implementation: "CPython".to_string(),
            platform_release: "5.15.0".to_string(),
            platform_system: "Linux".to_string(),
            platform_version: "#1 SMP".to_string(),
            implementation_name: "cpython".to_string(),
            implementation_version: "3.10.4".to_string(),
        }
    }

    #[test]
    fn simple_comparison() {
        let tree = parse_marker(r#"python_version >= "3.8""#).unwrap();
        assert!(tree.evaluate(&env(), ""));
        let tree = parse_marker(r#"python_version < "3.8""#).unwrap();
        assert!(!tree.evaluate(&env(), ""));
    }

    #[test]
    fn boolean_combinators() {
        let tree = parse_marker(
            r#"python_version == "3.10" and (sys_platform == "win32" or os_name == "posix")"#,
        )
        .unwrap();
        assert!(tree.evaluate(&env(), ""));
    }

    #[test]
    fn extra_gate() {
        let tree = parse_marker(r#"extra == "dev""#).unwrap();
        assert!(tree.evaluate(&env(), "dev"));
        assert!(!tree.evaluate(&env(), ""));
        assert!(!tree.evaluate(&env(), "test"));
    }

    #[test]
    fn in_operator() {
        let tree = parse_marker(r#""linux" in sys_platform"#).unwrap();
        assert!(tree.evaluate(&env(), ""));
    }

    #[test]
    fn rejects_unknown_variable() {
        assert!(parse_marker(r#"bogus_var == "x""#).is_err());
    }
}
