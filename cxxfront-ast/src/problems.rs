//! Syntax problem reporting
//!
//! Problem nodes stay in the tree so consumers always see a complete,
//! navigable structure; this module turns them into reportable
//! diagnostics after the fact.

use crate::arena::{NodeArena, NodeId};
use crate::ast::NodeKind;
use crate::visitor::{walk, VisitAction, Visitor};
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// A problem node surfaced as a diagnostic
#[derive(Debug, Error, Diagnostic)]
#[error("syntax problem: {raw_text}")]
#[diagnostic(
    code(cxxfront::ast::syntax_problem),
    help("the surrounding tree is still navigable; this marker covers the unparsable region")
)]
pub struct SyntaxProblem {
    pub raw_text: String,
    #[label("could not be parsed")]
    pub span: SourceSpan,
}

struct ProblemCollector {
    problems: Vec<SyntaxProblem>,
}

impl Visitor for ProblemCollector {
    fn enter_problem(&mut self, arena: &NodeArena, id: NodeId) -> VisitAction {
        if let NodeKind::Problem(p) = arena.kind(id) {
            let span = arena.span(id);
            self.problems.push(SyntaxProblem {
                raw_text: p.raw_text.clone(),
                span: SourceSpan::new(span.start.into(), span.len()),
            });
        }
        VisitAction::Continue
    }
}

/// Collect every problem node inside `root`, in source order.
pub fn collect_problems(arena: &NodeArena, root: NodeId) -> Vec<SyntaxProblem> {
    let mut collector = ProblemCollector {
        problems: Vec::new(),
    };
    walk(&mut collector, arena, root);
    collector.problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ChildRole, ProblemNode, Span, StatementKind};

    #[test]
    fn problems_are_collected_in_source_order() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(NodeKind::TranslationUnit, Span::new(0, 30));
        let stmt = arena.alloc(NodeKind::Statement(StatementKind::Problem), Span::new(0, 10));
        let p1 = arena.alloc(
            NodeKind::Problem(ProblemNode {
                raw_text: "@!#".to_string(),
            }),
            Span::new(2, 5),
        );
        let p2 = arena.alloc(
            NodeKind::Problem(ProblemNode {
                raw_text: "???".to_string(),
            }),
            Span::new(12, 15),
        );
        arena.attach(root, ChildRole::Member, stmt);
        arena.attach(stmt, ChildRole::Operand, p1);
        arena.attach(root, ChildRole::Member, p2);

        let problems = collect_problems(&arena, root);
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].raw_text, "@!#");
        assert_eq!(problems[1].raw_text, "???");
    }
}
