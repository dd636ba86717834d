#[cfg(test)]
mod parser_tests {
    use mocha::ast::{Expr, LiteralValue, Stmt};
    use mocha::ast_printer::AstPrinter;
    use mocha::error::MochaError;
    use mocha::parser::Parser;
    use mocha::scanner::Scanner;
    use mocha::token::Token;

    fn scan(source: &str) -> Vec<Token<'_>> {
        let (tokens, errors) = Scanner::new(source).scan_all();
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens
    }

    fn messages(errors: &[MochaError]) -> Vec<String> {
        errors.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_expression_precedence() {
        let tokens = scan("-123 * (45.67) + 2 == 3 or !false");
        let expr = Parser::new(&tokens).parse_expression().unwrap();

        assert_eq!(
            AstPrinter::print(&expr),
            "(or (== (+ (* (- 123.0) (group 45.67)) 2.0) 3.0) (! false))"
        );
    }

    #[test]
    fn test_trailing_tokens_after_expression() {
        let tokens = scan("1 + 2 3");
        let errors = Parser::new(&tokens).parse_expression().unwrap_err();

        assert_eq!(
            messages(&errors),
            vec!["[line 1] Error at '3': Expect end of expression."]
        );
    }

    #[test]
    fn test_for_desugars_into_while() {
        let tokens = scan("for (var i = 0; i < 3; i = i + 1) print i;");
        let statements = Parser::new(&tokens).parse().unwrap();

        assert_eq!(statements.len(), 1);

        // { var i = 0; while (i < 3) { print i; i = i + 1; } }
        let Stmt::Block(outer) = &statements[0] else {
            panic!("Expected a block, got {:?}", statements[0]);
        };
        assert_eq!(outer.len(), 2);
        assert!(matches!(outer[0], Stmt::Var { .. }));

        let Stmt::While { condition, body } = &outer[1] else {
            panic!("Expected a while loop, got {:?}", outer[1]);
        };
        assert_eq!(AstPrinter::print(condition), "(< i 3.0)");

        let Stmt::Block(inner) = body.as_ref() else {
            panic!("Expected the loop body to be a block, got {:?}", body);
        };
        assert!(matches!(inner[0], Stmt::Print(_)));
        assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn test_for_without_clauses_loops_on_true() {
        let tokens = scan("for (;;) print 1;");
        let statements = Parser::new(&tokens).parse().unwrap();

        match &statements[0] {
            Stmt::While { condition, body } => {
                assert_eq!(*condition, Expr::Literal(LiteralValue::True));
                assert!(matches!(body.as_ref(), Stmt::Print(_)));
            }
            other => panic!("Expected a bare while loop, got {:?}", other),
        }
    }

    #[test]
    fn test_class_with_superclass() {
        let tokens = scan("class B < A { init(x) { this.x = x; } get() { return super.get(); } }");
        let statements = Parser::new(&tokens).parse().unwrap();

        match &statements[0] {
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                assert_eq!(name.lexeme, "B");
                assert!(
                    matches!(superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A")
                );
                assert_eq!(methods.len(), 2);
                assert_eq!(methods[0].name.lexeme, "init");
                assert_eq!(methods[0].params.len(), 1);
                assert_eq!(methods[1].name.lexeme, "get");
            }
            other => panic!("Expected a class, got {:?}", other),
        }
    }

    #[test]
    fn test_recovers_and_reports_every_error() {
        let tokens = scan("var = 1;\nprint 2;\nprint (3;\nvar ok = 4;");
        let errors = Parser::new(&tokens).parse().unwrap_err();

        assert_eq!(
            messages(&errors),
            vec![
                "[line 1] Error at '=': Expect variable name.",
                "[line 3] Error at ';': Expect ')' after expression.",
            ]
        );
    }

    #[test]
    fn test_error_at_end() {
        let tokens = scan("print 1");
        let errors = Parser::new(&tokens).parse().unwrap_err();

        assert_eq!(
            messages(&errors),
            vec!["[line 1] Error at end: Expect ';' after value."]
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        let tokens = scan("a + b = c;\nprint 1;");
        let errors = Parser::new(&tokens).parse().unwrap_err();

        assert_eq!(
            messages(&errors),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
    }

    #[test]
    fn test_property_assignment_becomes_set() {
        let tokens = scan("a.b.c = 1;");
        let statements = Parser::new(&tokens).parse().unwrap();

        match &statements[0] {
            Stmt::Expression(expr @ Expr::Set { .. }) => {
                assert_eq!(AstPrinter::print(expr), "(= (. (. a b) c) 1.0)");
            }
            other => panic!("Expected a set expression, got {:?}", other),
        }
    }

    #[test]
    fn test_too_many_arguments() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));
        let tokens = scan(&source);
        let errors = Parser::new(&tokens).parse().unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .to_string()
            .ends_with("Can't have more than 255 arguments."));
    }

    #[test]
    fn test_super_requires_method_name() {
        let tokens = scan("super;");
        let errors = Parser::new(&tokens).parse().unwrap_err();

        assert_eq!(
            messages(&errors),
            vec!["[line 1] Error at ';': Expect '.' after 'super'."]
        );
    }
}
