use crate::span::Spanned;

/// A parsed translation unit: an ordered sequence of function declarations.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub functions: Vec<FunctionDecl>,
}

/// `int name(params);` (prototype) or `int name(params) { body }` (definition).
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Spanned<String>,
    pub params: Vec<Spanned<String>>,
    /// Present for definitions, absent for prototypes.
    pub body: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub items: Vec<BlockItem>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockItem {
    Declaration(Declaration),
    Statement(Spanned<Stmt>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Declaration {
    Var(VarDecl),
    /// Nested function prototype. Definitions inside blocks are rejected
    /// during identifier resolution.
    Func(FunctionDecl),
}

/// `int name;` or `int name = expr;`
#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub name: Spanned<String>,
    pub init: Option<Spanned<Expr>>,
}

/// Statements. Loops and `break`/`continue` carry a `label` annotation
/// field, absent after parsing and filled in by the loop labelling pass.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Return(Spanned<Expr>),
    Expression(Spanned<Expr>),
    If {
        cond: Spanned<Expr>,
        then_stmt: Box<Spanned<Stmt>>,
        else_stmt: Option<Box<Spanned<Stmt>>>,
    },
    Compound(Block),
    Break {
        label: Option<String>,
    },
    Continue {
        label: Option<String>,
    },
    While {
        cond: Spanned<Expr>,
        body: Box<Spanned<Stmt>>,
        label: Option<String>,
    },
    DoWhile {
        body: Box<Spanned<Stmt>>,
        cond: Spanned<Expr>,
        label: Option<String>,
    },
    For {
        init: ForInit,
        cond: Option<Spanned<Expr>>,
        post: Option<Spanned<Expr>>,
        body: Box<Spanned<Stmt>>,
        label: Option<String>,
    },
    Null,
}

/// The first clause of a `for` header: a declaration, an optional
/// expression, or nothing.
#[derive(Clone, Debug, PartialEq)]
pub enum ForInit {
    Declaration(VarDecl),
    Expression(Option<Spanned<Expr>>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Constant(i64),
    Var(Spanned<String>),
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Assignment {
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Conditional {
        cond: Box<Spanned<Expr>>,
        then_expr: Box<Spanned<Expr>>,
        else_expr: Box<Spanned<Expr>>,
    },
    Call {
        name: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Complement, // ~
    Negate,     // -
    Not,        // !
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,            // +
    Subtract,       // -
    Multiply,       // *
    Divide,         // /
    Remainder,      // %
    And,            // &&
    Or,             // ||
    Equal,          // ==
    NotEqual,       // !=
    LessThan,       // <
    LessOrEqual,    // <=
    GreaterThan,    // >
    GreaterOrEqual, // >=
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterOrEqual => ">=",
        }
    }

    /// True for `&&` and `||`, which lower through control flow rather
    /// than a single three-address instruction.
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Complement => "~",
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
        }
    }
}
