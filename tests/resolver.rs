#[cfg(test)]
mod resolver_tests {
    use mocha::ast::{Expr, ExprId, Stmt};
    use mocha::parser::Parser;
    use mocha::resolver::{Resolution, Resolver};
    use mocha::scanner::Scanner;
    use mocha::token::Token;

    fn scan(source: &str) -> Vec<Token<'_>> {
        let (tokens, errors) = Scanner::new(source).scan_all();
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens
    }

    fn parse<'a>(tokens: &'a [Token<'a>]) -> Vec<Stmt<'a>> {
        Parser::new(tokens).parse().expect("source should parse")
    }

    fn error_messages(resolution: &Resolution) -> Vec<String> {
        resolution.errors.iter().map(|e| e.to_string()).collect()
    }

    /// Id of the variable printed by a `print name;` statement.
    fn printed_variable(stmt: &Stmt<'_>) -> ExprId {
        match stmt {
            Stmt::Print(Expr::Variable { id, .. }) => *id,
            other => panic!("Expected `print <variable>;`, got {:?}", other),
        }
    }

    #[test]
    fn test_block_distances() {
        let tokens = scan("{ var a = 1; { var b = 2; print a; print b; } }");
        let statements = parse(&tokens);
        let resolution = Resolver::new().resolve(&statements);

        assert!(!resolution.had_error());

        let Stmt::Block(outer) = &statements[0] else {
            panic!("Expected a block");
        };
        let Stmt::Block(inner) = &outer[1] else {
            panic!("Expected a nested block");
        };

        assert_eq!(resolution.locals.get(&printed_variable(&inner[1])), Some(&1));
        assert_eq!(resolution.locals.get(&printed_variable(&inner[2])), Some(&0));
    }

    #[test]
    fn test_globals_are_not_recorded() {
        let tokens = scan("var g = 1; print g; { print g; }");
        let statements = parse(&tokens);
        let resolution = Resolver::new().resolve(&statements);

        assert!(!resolution.had_error());
        assert!(resolution.locals.is_empty());
    }

    #[test]
    fn test_closure_binds_to_declaring_scope() {
        // The `print a` inside `show` must keep resolving to the outer `a`
        // even though a later local `a` is declared in the same block.
        let tokens = scan(
            "var a = \"global\"; { fun show() { print a; } show(); var a = \"block\"; show(); }",
        );
        let statements = parse(&tokens);
        let resolution = Resolver::new().resolve(&statements);

        assert!(!resolution.had_error());

        let Stmt::Block(block) = &statements[1] else {
            panic!("Expected a block");
        };
        let Stmt::Function(show) = &block[0] else {
            panic!("Expected a function declaration");
        };

        assert_eq!(resolution.locals.get(&printed_variable(&show.body[0])), None);
    }

    #[test]
    fn test_parameters_live_in_function_scope() {
        let tokens = scan("fun f(x) { print x; { print x; } }");
        let statements = parse(&tokens);
        let resolution = Resolver::new().resolve(&statements);

        let Stmt::Function(f) = &statements[0] else {
            panic!("Expected a function declaration");
        };
        let Stmt::Block(inner) = &f.body[1] else {
            panic!("Expected a block");
        };

        assert_eq!(resolution.locals.get(&printed_variable(&f.body[0])), Some(&0));
        assert_eq!(resolution.locals.get(&printed_variable(&inner[0])), Some(&1));
    }

    #[test]
    fn test_resolving_twice_gives_same_distances() {
        let tokens = scan(
            "class A { m() { return this; } } class B < A { m() { return super.m(); } } \
             fun outer() { var x = 1; fun inner() { return x; } return inner; }",
        );
        let statements = parse(&tokens);

        let first = Resolver::new().resolve(&statements);
        let second = Resolver::new().resolve(&statements);

        assert!(!first.had_error());
        assert!(!first.locals.is_empty());
        assert_eq!(first.locals, second.locals);
    }

    #[test]
    fn test_read_in_own_initializer() {
        let tokens = scan("{ var a = a; }");
        let statements = parse(&tokens);
        let resolution = Resolver::new().resolve(&statements);

        assert_eq!(
            error_messages(&resolution),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_global_self_initializer_is_allowed() {
        let tokens = scan("var a = a;");
        let statements = parse(&tokens);

        assert!(!Resolver::new().resolve(&statements).had_error());
    }

    #[test]
    fn test_redeclaration_in_local_scope() {
        let tokens = scan("var a = 1; var a = 2; { var b = 1; var b = 2; }");
        let statements = parse(&tokens);
        let resolution = Resolver::new().resolve(&statements);

        assert_eq!(
            error_messages(&resolution),
            vec!["[line 1] Error at 'b': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_invalid_returns() {
        let tokens = scan("return 1;\nclass A { init() { return 2; } other() { return 3; } }");
        let statements = parse(&tokens);
        let resolution = Resolver::new().resolve(&statements);

        assert_eq!(
            error_messages(&resolution),
            vec![
                "[line 1] Error at 'return': Can't return from top-level code.",
                "[line 2] Error at 'return': Can't return a value from an initializer.",
            ]
        );
    }

    #[test]
    fn test_bare_return_in_initializer_is_allowed() {
        let tokens = scan("class A { init() { return; } }");
        let statements = parse(&tokens);

        assert!(!Resolver::new().resolve(&statements).had_error());
    }

    #[test]
    fn test_this_and_super_outside_class() {
        let tokens = scan("print this;\nfun f() { super.m(); }\nclass A { m() { super.m(); } }");
        let statements = parse(&tokens);
        let resolution = Resolver::new().resolve(&statements);

        assert_eq!(
            error_messages(&resolution),
            vec![
                "[line 1] Error at 'this': Can't use 'this' outside of a class.",
                "[line 2] Error at 'super': Can't use 'super' outside of a class.",
                "[line 3] Error at 'super': Can't use 'super' in a class with no superclass.",
            ]
        );
    }

    #[test]
    fn test_class_cannot_inherit_from_itself() {
        let tokens = scan("class A < A {}");
        let statements = parse(&tokens);
        let resolution = Resolver::new().resolve(&statements);

        assert_eq!(
            error_messages(&resolution),
            vec!["[line 1] Error at 'A': A class can't inherit from itself."]
        );
    }

    #[test]
    fn test_this_and_super_distances_in_method() {
        let tokens = scan("class A {} class B < A { m() { print this; super.m(); } }");
        let statements = parse(&tokens);
        let resolution = Resolver::new().resolve(&statements);

        assert!(!resolution.had_error());

        let Stmt::Class { methods, .. } = &statements[1] else {
            panic!("Expected a class");
        };

        // method scope (0) → this scope (1) → super scope (2)
        let this_id = match &methods[0].body[0] {
            Stmt::Print(Expr::This { id, .. }) => *id,
            other => panic!("Expected `print this;`, got {:?}", other),
        };
        let super_id = match &methods[0].body[1] {
            Stmt::Expression(Expr::Call { callee, .. }) => match callee.as_ref() {
                Expr::Super { id, .. } => *id,
                other => panic!("Expected a super access, got {:?}", other),
            },
            other => panic!("Expected a call statement, got {:?}", other),
        };

        assert_eq!(resolution.locals.get(&this_id), Some(&1));
        assert_eq!(resolution.locals.get(&super_id), Some(&2));
    }
}
