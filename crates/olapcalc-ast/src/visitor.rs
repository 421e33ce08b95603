//! Visitor over unresolved expression trees
//!
//! All methods have default implementations, so visitors only override the
//! nodes they care about. Each `visit_*` method is called before recursing;
//! returning `false` skips the children of that node.

use crate::{Call, Exp, Identifier, Literal};

pub trait Visitor {
    fn visit_literal(&mut self, _literal: &Literal) -> bool {
        true
    }

    fn visit_id(&mut self, _id: &Identifier) -> bool {
        true
    }

    fn visit_call(&mut self, _call: &Call) -> bool {
        true
    }

    /// Walk `exp`, calling the visit methods
    fn walk(&mut self, exp: &Exp) {
        walk_exp(self, exp);
    }
}

/// Walk an expression tree, calling visitor methods and recursing into calls
pub fn walk_exp<V: Visitor + ?Sized>(visitor: &mut V, exp: &Exp) {
    match exp {
        Exp::Literal(l) => {
            visitor.visit_literal(l);
        }
        Exp::Id(id) => {
            visitor.visit_id(id);
        }
        Exp::Call(call) => {
            if visitor.visit_call(call) {
                for arg in &call.args {
                    walk_exp(visitor, arg);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Ids {
        found: Vec<String>,
    }

    impl Visitor for Ids {
        fn visit_id(&mut self, id: &Identifier) -> bool {
            self.found.push(id.to_string());
            true
        }

        fn visit_call(&mut self, call: &Call) -> bool {
            call.name != "Skip"
        }
    }

    #[test]
    fn test_collects_ids_and_skips() {
        let exp = Exp::infix(
            "+",
            Exp::id("[Measures].[Sales]"),
            Exp::func("Skip", vec![Exp::id("[Measures].[Cost]")]),
        );
        let mut ids = Ids::default();
        ids.walk(&exp);
        assert_eq!(ids.found, vec!["[Measures].[Sales]".to_string()]);
    }
}
