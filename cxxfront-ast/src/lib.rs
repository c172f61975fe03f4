//! cxxfront AST layer
//!
//! Arena-stored concrete syntax tree consumed by the semantic core. The
//! concrete-syntax parser is an external collaborator: it allocates node
//! shells, attaches children (parent and role set on attach), and hands
//! the finished tree over. Everything here is about structure; bindings
//! and types are the semantic crate's business.
//!
//! ## Key pieces
//!
//! - **Node kinds** (`ast`): closed tagged-variant families for
//!   declarations, declarators, statements, expressions, names,
//!   designators, attributes and problem nodes.
//! - **Arena** (`arena`): stable-index storage with two-sided
//!   parent/child bookkeeping, atomic child replacement, freezing, and
//!   deep copies with or without source locations.
//! - **Visitor** (`visitor`): depth-first traversal with
//!   continue/skip/abort steering and post-order leave hooks.
//! - **Ambiguous nodes**: transient nodes holding multiple valid parses;
//!   the semantic crate resolves them and commits the winner via
//!   `replace_child`.

pub mod arena;
pub mod ast;
pub mod builder;
pub mod problems;
pub mod visitor;

pub use arena::{Ancestors, CopyStyle, Node, NodeArena, NodeId};
pub use ast::{
    AmbiguityKind, Attribute, BinaryOperator, CastStyle, ChildRole, ClassKey, CvQualifiers,
    DeclSpecifier, DeclSpecifierKind, DeclarationKind, DeclaratorInfo, DeclaratorKind,
    DesignatorKind, ExpressionKind, LiteralExpr, NameKind, NodeKind, PlaceholderKind,
    PointerOperator, ProblemNode, SimpleTypeKeyword, Span, StatementKind, StorageClass,
    TemplateParameterDecl, TemplateParameterDeclKind, TypeIdOperator, TypeModifiers,
    UnaryOperator, Visibility,
};
pub use problems::{collect_problems, SyntaxProblem};
pub use visitor::{walk, VisitAction, Visitor};
