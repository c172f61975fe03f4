//! Construction helpers for AST shells
//!
//! The concrete-syntax parser lives outside this crate; what it hands
//! over are node shells with children already attached. These helpers
//! are that construction surface, and the test suites use them to build
//! the same shapes a parser would.

use crate::arena::{NodeArena, NodeId};
use crate::ast::{
    AmbiguityKind, BinaryOperator, CastStyle, ChildRole, ClassKey, DeclSpecifier,
    DeclSpecifierKind, DeclarationKind, DeclaratorInfo, ExpressionKind, LiteralExpr, NameKind,
    NodeKind, PlaceholderKind, PointerOperator, SimpleTypeKeyword, Span, StatementKind,
    TemplateParameterDecl, TemplateParameterDeclKind, UnaryOperator,
};

impl NodeArena {
    pub fn translation_unit(&mut self, span: Span) -> NodeId {
        self.alloc(NodeKind::TranslationUnit, span)
    }

    pub fn identifier(&mut self, text: &str, span: Span) -> NodeId {
        self.alloc(
            NodeKind::Name(NameKind::Identifier {
                text: text.to_string(),
            }),
            span,
        )
    }

    /// `outer::inner` style name; `segments` are attached in order and the
    /// last segment is the unqualified name.
    pub fn qualified_name(&mut self, segments: Vec<NodeId>, span: Span) -> NodeId {
        let name = self.alloc(
            NodeKind::Name(NameKind::Qualified {
                fully_qualified: false,
            }),
            span,
        );
        for segment in segments {
            self.attach(name, ChildRole::Segment, segment);
        }
        name
    }

    /// `name<args...>`; arguments are type ids or expressions.
    pub fn template_id(&mut self, name: NodeId, args: Vec<NodeId>, span: Span) -> NodeId {
        let id = self.alloc(NodeKind::Name(NameKind::TemplateId), span);
        self.attach(id, ChildRole::Name, name);
        for arg in args {
            self.attach(id, ChildRole::TemplateArgument, arg);
        }
        id
    }

    pub fn simple_decl_specifier(&mut self, keyword: SimpleTypeKeyword, span: Span) -> NodeId {
        self.alloc(NodeKind::DeclSpecifier(DeclSpecifier::simple(keyword)), span)
    }

    pub fn placeholder_decl_specifier(&mut self, kind: PlaceholderKind, span: Span) -> NodeId {
        let mut spec = DeclSpecifier::simple(SimpleTypeKeyword::Unspecified);
        spec.kind = DeclSpecifierKind::Placeholder { kind };
        self.alloc(NodeKind::DeclSpecifier(spec), span)
    }

    pub fn named_decl_specifier(&mut self, name: NodeId, span: Span) -> NodeId {
        let spec = self.alloc(NodeKind::DeclSpecifier(DeclSpecifier::named()), span);
        self.attach(spec, ChildRole::Name, name);
        spec
    }

    pub fn decl_specifier(&mut self, payload: DeclSpecifier, span: Span) -> NodeId {
        self.alloc(NodeKind::DeclSpecifier(payload), span)
    }

    /// Class definition specifier; members are attached afterwards with
    /// role `Member`.
    pub fn class_specifier(&mut self, key: ClassKey, name: NodeId, span: Span) -> NodeId {
        let mut spec = DeclSpecifier::simple(SimpleTypeKeyword::Unspecified);
        spec.kind = DeclSpecifierKind::Class { key };
        let node = self.alloc(NodeKind::DeclSpecifier(spec), span);
        self.attach(node, ChildRole::Name, name);
        node
    }

    pub fn enum_specifier(&mut self, scoped: bool, name: NodeId, span: Span) -> NodeId {
        let mut spec = DeclSpecifier::simple(SimpleTypeKeyword::Unspecified);
        spec.kind = DeclSpecifierKind::Enum { scoped };
        let node = self.alloc(NodeKind::DeclSpecifier(spec), span);
        self.attach(node, ChildRole::Name, name);
        node
    }

    pub fn declarator(&mut self, name: NodeId, span: Span) -> NodeId {
        let node = self.alloc(NodeKind::Declarator(DeclaratorInfo::plain()), span);
        self.attach(node, ChildRole::Name, name);
        node
    }

    pub fn declarator_with(&mut self, info: DeclaratorInfo, name: NodeId, span: Span) -> NodeId {
        let node = self.alloc(NodeKind::Declarator(info), span);
        self.attach(node, ChildRole::Name, name);
        node
    }

    pub fn pointer_operator(&mut self, op: PointerOperator, span: Span) -> NodeId {
        self.alloc(NodeKind::PointerOperator(op), span)
    }

    /// Declarator with no declared name, as used inside type-ids.
    pub fn abstract_declarator(&mut self, info: DeclaratorInfo, span: Span) -> NodeId {
        self.alloc(NodeKind::Declarator(info), span)
    }

    /// One enumerator of an enum specifier: a name and an optional
    /// constant initializer. Attach with role `Enumerator`.
    pub fn enumerator(&mut self, name: NodeId, initializer: Option<NodeId>, span: Span) -> NodeId {
        let node = self.alloc(NodeKind::Declarator(DeclaratorInfo::plain()), span);
        self.attach(node, ChildRole::Name, name);
        if let Some(initializer) = initializer {
            self.attach(node, ChildRole::Initializer, initializer);
        }
        node
    }

    /// decl-specifier + declarators
    pub fn simple_declaration(
        &mut self,
        decl_specifier: NodeId,
        declarators: Vec<NodeId>,
        span: Span,
    ) -> NodeId {
        let decl = self.alloc(NodeKind::Declaration(DeclarationKind::Simple), span);
        self.attach(decl, ChildRole::DeclSpecifier, decl_specifier);
        for declarator in declarators {
            self.attach(decl, ChildRole::Declarator, declarator);
        }
        decl
    }

    pub fn function_definition(
        &mut self,
        decl_specifier: NodeId,
        declarator: NodeId,
        body: NodeId,
        span: Span,
    ) -> NodeId {
        let decl = self.alloc(
            NodeKind::Declaration(DeclarationKind::FunctionDefinition),
            span,
        );
        self.attach(decl, ChildRole::DeclSpecifier, decl_specifier);
        self.attach(decl, ChildRole::Declarator, declarator);
        self.attach(decl, ChildRole::Body, body);
        decl
    }

    pub fn namespace_definition(&mut self, name: NodeId, span: Span) -> NodeId {
        let decl = self.alloc(NodeKind::Declaration(DeclarationKind::Namespace), span);
        self.attach(decl, ChildRole::Name, name);
        decl
    }

    /// template parameter list + the declared inner declaration
    pub fn template_declaration(
        &mut self,
        parameters: Vec<NodeId>,
        inner: NodeId,
        span: Span,
    ) -> NodeId {
        let decl = self.alloc(
            NodeKind::Declaration(DeclarationKind::TemplateDeclaration),
            span,
        );
        for parameter in parameters {
            self.attach(decl, ChildRole::TemplateParameter, parameter);
        }
        self.attach(decl, ChildRole::InnerDeclaration, inner);
        decl
    }

    pub fn type_template_parameter(
        &mut self,
        name: NodeId,
        is_pack: bool,
        default: Option<NodeId>,
        span: Span,
    ) -> NodeId {
        let node = self.alloc(
            NodeKind::TemplateParameterDecl(TemplateParameterDecl {
                kind: TemplateParameterDeclKind::Type,
                is_pack,
            }),
            span,
        );
        self.attach(node, ChildRole::Name, name);
        if let Some(default) = default {
            self.attach(node, ChildRole::DefaultArgument, default);
        }
        node
    }

    pub fn non_type_template_parameter(
        &mut self,
        type_id: NodeId,
        name: NodeId,
        is_pack: bool,
        default: Option<NodeId>,
        span: Span,
    ) -> NodeId {
        let node = self.alloc(
            NodeKind::TemplateParameterDecl(TemplateParameterDecl {
                kind: TemplateParameterDeclKind::NonType,
                is_pack,
            }),
            span,
        );
        self.attach(node, ChildRole::TypeId, type_id);
        self.attach(node, ChildRole::Name, name);
        if let Some(default) = default {
            self.attach(node, ChildRole::DefaultArgument, default);
        }
        node
    }

    /// decl-specifier + optional abstract declarator
    pub fn type_id(
        &mut self,
        decl_specifier: NodeId,
        abstract_declarator: Option<NodeId>,
        span: Span,
    ) -> NodeId {
        let node = self.alloc(NodeKind::TypeIdNode, span);
        self.attach(node, ChildRole::DeclSpecifier, decl_specifier);
        if let Some(declarator) = abstract_declarator {
            self.attach(node, ChildRole::AbstractDeclarator, declarator);
        }
        node
    }

    pub fn parameter_declaration(
        &mut self,
        decl_specifier: NodeId,
        declarator: NodeId,
        span: Span,
    ) -> NodeId {
        let node = self.alloc(NodeKind::ParameterDeclaration, span);
        self.attach(node, ChildRole::DeclSpecifier, decl_specifier);
        self.attach(node, ChildRole::Declarator, declarator);
        node
    }

    pub fn int_literal(&mut self, value: i64, span: Span) -> NodeId {
        self.alloc(
            NodeKind::Expression(ExpressionKind::Literal(LiteralExpr::Integer {
                value,
                text: value.to_string(),
            })),
            span,
        )
    }

    pub fn float_literal(&mut self, value: f64, span: Span) -> NodeId {
        self.alloc(
            NodeKind::Expression(ExpressionKind::Literal(LiteralExpr::Float { value })),
            span,
        )
    }

    pub fn string_literal(&mut self, value: &str, span: Span) -> NodeId {
        self.alloc(
            NodeKind::Expression(ExpressionKind::Literal(LiteralExpr::String {
                value: value.to_string(),
            })),
            span,
        )
    }

    pub fn bool_literal(&mut self, value: bool, span: Span) -> NodeId {
        self.alloc(
            NodeKind::Expression(ExpressionKind::Literal(LiteralExpr::Bool { value })),
            span,
        )
    }

    pub fn id_expression(&mut self, name: NodeId, span: Span) -> NodeId {
        let expr = self.alloc(NodeKind::Expression(ExpressionKind::IdExpression), span);
        self.attach(expr, ChildRole::Name, name);
        expr
    }

    pub fn unary(&mut self, op: UnaryOperator, operand: NodeId, span: Span) -> NodeId {
        let expr = self.alloc(NodeKind::Expression(ExpressionKind::Unary(op)), span);
        self.attach(expr, ChildRole::Operand, operand);
        expr
    }

    pub fn binary(&mut self, op: BinaryOperator, left: NodeId, right: NodeId, span: Span) -> NodeId {
        let expr = self.alloc(NodeKind::Expression(ExpressionKind::Binary(op)), span);
        self.attach(expr, ChildRole::LeftOperand, left);
        self.attach(expr, ChildRole::RightOperand, right);
        expr
    }

    pub fn cast(&mut self, style: CastStyle, type_id: NodeId, operand: NodeId, span: Span) -> NodeId {
        let expr = self.alloc(NodeKind::Expression(ExpressionKind::Cast(style)), span);
        self.attach(expr, ChildRole::TypeId, type_id);
        self.attach(expr, ChildRole::Operand, operand);
        expr
    }

    pub fn function_call(&mut self, callee: NodeId, arguments: Vec<NodeId>, span: Span) -> NodeId {
        let expr = self.alloc(NodeKind::Expression(ExpressionKind::FunctionCall), span);
        self.attach(expr, ChildRole::FunctionName, callee);
        for argument in arguments {
            self.attach(expr, ChildRole::Argument, argument);
        }
        expr
    }

    pub fn compound_statement(&mut self, statements: Vec<NodeId>, span: Span) -> NodeId {
        let stmt = self.alloc(NodeKind::Statement(StatementKind::Compound), span);
        for statement in statements {
            self.attach(stmt, ChildRole::Statement, statement);
        }
        stmt
    }

    pub fn expression_statement(&mut self, expression: NodeId, span: Span) -> NodeId {
        let stmt = self.alloc(NodeKind::Statement(StatementKind::Expression), span);
        self.attach(stmt, ChildRole::Operand, expression);
        stmt
    }

    pub fn declaration_statement(&mut self, declaration: NodeId, span: Span) -> NodeId {
        let stmt = self.alloc(NodeKind::Statement(StatementKind::Declaration), span);
        self.attach(stmt, ChildRole::InnerDeclaration, declaration);
        stmt
    }

    pub fn return_statement(&mut self, value: Option<NodeId>, span: Span) -> NodeId {
        let stmt = self.alloc(NodeKind::Statement(StatementKind::Return), span);
        if let Some(value) = value {
            self.attach(stmt, ChildRole::Operand, value);
        }
        stmt
    }

    /// Ambiguous node over 2+ alternatives; the attach order is the trial
    /// order.
    pub fn ambiguous(&mut self, kind: AmbiguityKind, alternatives: Vec<NodeId>, span: Span) -> NodeId {
        assert!(
            alternatives.len() >= 2,
            "an ambiguous node needs at least two alternatives"
        );
        let node = self.alloc(NodeKind::Ambiguous(kind), span);
        for alternative in alternatives {
            self.attach(node, ChildRole::Alternative, alternative);
        }
        node
    }

    /// The identifier text of a name node, when it has one. Qualified
    /// names answer with their last segment, template ids with their
    /// template name.
    pub fn name_text(&self, name: NodeId) -> Option<String> {
        match self.kind(name) {
            NodeKind::Name(NameKind::Identifier { text }) => Some(text.clone()),
            NodeKind::Name(NameKind::OperatorName { spelling }) => Some(spelling.clone()),
            NodeKind::Name(NameKind::Qualified { .. }) => {
                let segments = self.children_with_role(name, ChildRole::Segment);
                segments.last().and_then(|s| self.name_text(*s))
            }
            NodeKind::Name(NameKind::TemplateId) => {
                let inner = self.child(name, ChildRole::Name)?;
                self.name_text(inner)
            }
            _ => None,
        }
    }
}
