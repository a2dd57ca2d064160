//! Expression AST.

/// Comparison and test operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsTrue,
    IsNotTrue,
    IsEmpty,
    IsNotEmpty,
    IsNull,
    IsNotNull,
}

impl Operand {
    /// The operator name used in error traces.
    pub fn name(self) -> &'static str {
        match self {
            Operand::Eq => "eq",
            Operand::Ne => "ne",
            Operand::Lt => "lt",
            Operand::Le => "le",
            Operand::Gt => "gt",
            Operand::Ge => "ge",
            Operand::IsTrue => "is_true",
            Operand::IsNotTrue => "is_not_true",
            Operand::IsEmpty => "is_empty",
            Operand::IsNotEmpty => "is_not_empty",
            Operand::IsNull => "is_null",
            Operand::IsNotNull => "is_not_null",
        }
    }
}

/// A parsed expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `'quoted string'`
    Literal(String),
    /// A dotted context path.
    Variable(String),
    /// `path.name()`
    Function { path: String, name: String },
    Int(i64),
    Real(f64),
    /// `atom is true`, `atom is null`, …
    Unary { op: Operand, operand: Box<Expr> },
    /// `atom = atom`, `atom < atom`, …
    Binary {
        op: Operand,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Build a function node from a full `path.name` identifier; the
    /// part after the last dot is the function name.
    pub fn function(full: &str) -> Self {
        match full.rfind('.') {
            Some(position) => Expr::Function {
                path: full[..position].to_string(),
                name: full[position + 1..].to_string(),
            },
            None => Expr::Function {
                path: String::new(),
                name: full.to_string(),
            },
        }
    }

    /// Stable textual form used in `At token …` error frames.
    pub fn repr(&self) -> String {
        match self {
            Expr::Literal(s) => format!("string({})", s),
            Expr::Variable(v) => format!("variable({})", v),
            Expr::Function { path, name } => format!("function({}.{}())", path, name),
            Expr::Int(v) => format!("integer({})", v),
            Expr::Real(v) => format!("real({})", v),
            Expr::Unary { op, operand } => format!("{}({})", op.name(), operand.repr()),
            Expr::Binary { op, lhs, rhs } => {
                format!("{}({},{})", op.name(), lhs.repr(), rhs.repr())
            }
            Expr::And(lhs, rhs) => format!("and({},{})", lhs.repr(), rhs.repr()),
            Expr::Or(lhs, rhs) => format!("or({},{})", lhs.repr(), rhs.repr()),
            Expr::Not(rhs) => format!("not({})", rhs.repr()),
        }
    }

    /// The token kind named in error frames.
    pub(crate) fn token_name(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "string",
            Expr::Variable(_) => "variable",
            Expr::Function { .. } => "function",
            Expr::Int(_) => "integer",
            Expr::Real(_) => "real",
            Expr::Unary { op, .. } | Expr::Binary { op, .. } => op.name(),
            Expr::And(..) => "and",
            Expr::Or(..) => "or",
            Expr::Not(..) => "not",
        }
    }

    /// The token payload named in error frames.
    pub(crate) fn token_value(&self) -> String {
        match self {
            Expr::Literal(s) => s.clone(),
            Expr::Variable(v) => v.clone(),
            Expr::Function { path, name } => format!("{}.{}()", path, name),
            Expr::Int(v) => v.to_string(),
            Expr::Real(v) => v.to_string(),
            Expr::Unary { operand, .. } => operand.repr(),
            Expr::Binary { lhs, rhs, .. } | Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
                format!("{},{}", lhs.repr(), rhs.repr())
            }
            Expr::Not(rhs) => rhs.repr(),
        }
    }
}
