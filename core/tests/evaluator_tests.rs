use nlisp::{Engine, EngineConfig, LispError, Value};

fn engine() -> Engine {
    Engine::with_config(EngineConfig::new().without_init_file()).unwrap()
}

fn eval_expr(expr: &str) -> String {
    match engine().evaluate(expr) {
        Ok(result) => result.to_string(),
        Err(e) => format!("Error: {e}"),
    }
}

fn eval_err(expr: &str) -> LispError {
    engine().evaluate(expr).unwrap_err()
}

#[test]
fn test_self_evaluating_atoms() {
    assert_eq!(eval_expr("42"), "42");
    assert_eq!(eval_expr("-2.5"), "-2.5");
    assert_eq!(eval_expr("\"text\""), "\"text\"");
    assert_eq!(eval_expr("nil"), "nil");
    assert_eq!(eval_expr("t"), "t");
    assert_eq!(eval_expr("()"), "nil");
}

#[test]
fn test_quote() {
    assert_eq!(eval_expr("(quote a)"), "a");
    assert_eq!(eval_expr("'(1 2 3)"), "(1 2 3)");
    assert_eq!(eval_expr("''a"), "(quote a)");
}

#[test]
fn test_arithmetic() {
    assert_eq!(eval_expr("(+ 2 3)"), "5");
    assert_eq!(eval_expr("(- 10 4 1)"), "5");
    assert_eq!(eval_expr("(- 3)"), "-3");
    assert_eq!(eval_expr("(* 2 3 4)"), "24");
    assert_eq!(eval_expr("(/ 7 2)"), "3.5");
    assert_eq!(eval_expr("(mod 7 3)"), "1");
}

#[test]
fn test_addition_is_polymorphic() {
    assert_eq!(eval_expr("(+ \"ab\" \"cd\")"), "\"abcd\"");
    assert_eq!(eval_expr("(+ '(1 2) '(3))"), "(1 2 3)");
}

#[test]
fn test_mixed_addition_is_invalid() {
    assert!(matches!(eval_err("(+ 1 \"x\")"), LispError::InvalidOperation { .. }));
}

#[test]
fn test_division_by_zero_is_an_error() {
    assert_eq!(eval_err("(/ 1 0)"), LispError::DivisionByZero);
    assert_eq!(eval_err("(mod 1 0)"), LispError::DivisionByZero);
}

#[test]
fn test_comparisons() {
    assert_eq!(eval_expr("(< 1 2)"), "t");
    assert_eq!(eval_expr("(> 1 2)"), "nil");
    assert_eq!(eval_expr("(= 2 2)"), "t");
    assert_eq!(eval_expr("(<= 2 2 3)"), "t");
    assert_eq!(eval_expr("(>= 1 2)"), "nil");
    assert_eq!(eval_expr("(< \"abc\" \"abd\")"), "t");
}

#[test]
fn test_car_cdr_cons() {
    assert_eq!(eval_expr("(car (cons 1 2))"), "1");
    assert_eq!(eval_expr("(cdr (cons 1 2))"), "2");
    assert_eq!(eval_expr("(cons 1 '(2 3))"), "(1 2 3)");
    assert_eq!(eval_expr("(car nil)"), "nil");
    assert_eq!(eval_expr("(cdr nil)"), "nil");
    assert!(matches!(eval_err("(car 5)"), LispError::ListExpected(_)));
}

#[test]
fn test_predicates() {
    assert_eq!(eval_expr("(nullp nil)"), "t");
    assert_eq!(eval_expr("(nullp '(1))"), "nil");
    assert_eq!(eval_expr("(consp '(1))"), "t");
    assert_eq!(eval_expr("(symbolp 'a)"), "t");
    assert_eq!(eval_expr("(numberp 1)"), "t");
    assert_eq!(eval_expr("(stringp \"s\")"), "t");
    assert_eq!(eval_expr("(stringp 's)"), "nil");
}

#[test]
fn test_if() {
    assert_eq!(eval_expr("(if t 1 2)"), "1");
    assert_eq!(eval_expr("(if nil 1 2)"), "2");
    assert_eq!(eval_expr("(if 0 1 2)"), "1");
    assert_eq!(eval_err("(if t 1)"), LispError::arity("if", 3, 2));
}

#[test]
fn test_progn() {
    assert_eq!(eval_expr("(progn 1 2 3)"), "3");
    assert_eq!(eval_expr("(progn)"), "nil");
}

#[test]
fn test_define_and_setq() {
    assert_eq!(eval_expr("(define x 5) x"), "5");
    assert_eq!(eval_expr("(define x 5) (setq x 6) x"), "6");
    assert_eq!(eval_err("(setq undefined-var 1)"), LispError::UndefinedSymbol("undefined-var".into()));
    assert_eq!(eval_err("(define 1 2)"), LispError::SymbolExpected("1".into()));
}

#[test]
fn test_undefined_symbol() {
    assert_eq!(eval_err("foo"), LispError::UndefinedSymbol("foo".into()));
}

#[test]
fn test_undefined_function() {
    assert_eq!(eval_err("(1 2)"), LispError::UndefinedFunction("1".into()));
    assert_eq!(eval_err("(\"f\" 2)"), LispError::UndefinedFunction("\"f\"".into()));
    assert_eq!(eval_err("(nope 2)"), LispError::UndefinedSymbol("nope".into()));
}

#[test]
fn test_lambda() {
    assert_eq!(eval_expr("((lambda (x) x) 42)"), "42");
    assert_eq!(eval_expr("((lambda (x y) (cons x y)) 1 2)"), "(1 . 2)");
    assert_eq!(eval_expr("((lambda () 7))"), "7");
    assert_eq!(eval_expr("((lambda (x)) 1)"), "nil");
    assert!(matches!(eval_err("(lambda 5 1)"), LispError::ListExpected(_)));
}

#[test]
fn test_closures_capture_by_reference() {
    assert_eq!(
        eval_expr("(define x 1) (define f (lambda () x)) (setq x 2) (f)"),
        "2"
    );
}

#[test]
fn test_closures_keep_private_state() {
    let engine = engine();
    engine
        .evaluate(
            "(defun make-counter ()
               (define n 0)
               (lambda () (setq n (+ n 1))))
             (define c1 (make-counter))
             (define c2 (make-counter))",
        )
        .unwrap();
    assert_eq!(engine.evaluate("(c1) (c1)").unwrap(), Value::Number(2.0));
    assert_eq!(engine.evaluate("(c2)").unwrap(), Value::Number(1.0));
}

#[test]
fn test_rest_parameters() {
    let engine = engine();
    engine.evaluate("(define f (lambda (a &rest b) b))").unwrap();
    assert_eq!(engine.evaluate("(f 1 2 3)").unwrap().to_string(), "(2 3)");
    assert!(engine.evaluate("(f 1)").unwrap().is_nil());
    assert_eq!(
        engine.evaluate("(f)").unwrap_err(),
        LispError::arity_at_least("lambda", 1, 0)
    );
}

#[test]
fn test_misplaced_rest_is_rejected() {
    assert!(matches!(
        eval_err("(lambda (&rest a b) a)"),
        LispError::InvalidParameterList(_)
    ));
}

#[test]
fn test_defun_and_recursion() {
    let engine = engine();
    engine
        .evaluate("(defun fact (n) (if (< n 2) 1 (* n (fact (- n 1)))))")
        .unwrap();
    assert_eq!(engine.evaluate("(fact 10)").unwrap(), Value::Number(3628800.0));
    assert_eq!(engine.evaluate("fact").unwrap().to_string(), "<closure fact>");
}

#[test]
fn test_closure_arity_errors_name_the_function() {
    let engine = engine();
    engine.evaluate("(defun two (a b) (print a))").unwrap();
    assert_eq!(engine.evaluate("(two 1)").unwrap_err(), LispError::arity("two", 2, 1));
    assert_eq!(engine.evaluate("(two 1 2 3)").unwrap_err(), LispError::arity("two", 2, 3));
}

#[test]
fn test_native_arity_errors() {
    assert_eq!(eval_err("(car 1 2)"), LispError::arity("car", 1, 2));
    assert_eq!(eval_err("(cons 1)"), LispError::arity("cons", 2, 1));
}

#[test]
fn test_while() {
    assert_eq!(
        eval_expr("(define i 0) (define sum 0) (while (< i 5) (setq sum (+ sum i)) (setq i (+ i 1))) sum"),
        "10"
    );
    assert_eq!(eval_expr("(while nil 1)"), "nil");
}

#[test]
fn test_arguments_evaluate_left_to_right() {
    let engine = engine();
    let printed = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = printed.clone();
    engine.on_print(move |text| sink.borrow_mut().push(text.to_string()));
    engine.evaluate("(list (print 1) (print 2) (print 3))").unwrap();
    assert_eq!(*printed.borrow(), vec!["1", "2", "3"]);
}

#[test]
fn test_error_aborts_remaining_forms() {
    let engine = engine();
    assert!(engine.evaluate("(define a 1) (car 5) (define b 2)").is_err());
    assert_eq!(engine.evaluate("a").unwrap(), Value::Number(1.0));
    assert!(matches!(engine.evaluate("b"), Err(LispError::UndefinedSymbol(_))));
}

#[test]
fn test_sequences() {
    assert_eq!(eval_expr("(list 1 2 3)"), "(1 2 3)");
    assert_eq!(eval_expr("(list)"), "nil");
    assert_eq!(eval_expr("(length '(1 2 3))"), "3");
    assert_eq!(eval_expr("(length \"hello\")"), "5");
    assert_eq!(eval_expr("(length nil)"), "0");
    assert_eq!(eval_expr("(reverse '(1 2 3))"), "(3 2 1)");
    assert_eq!(eval_expr("(reverse \"abc\")"), "\"cba\"");
    assert_eq!(eval_expr("(map (lambda (x) (* x x)) '(1 2 3))"), "(1 4 9)");
    assert_eq!(eval_expr("(filter (lambda (x) (> x 1)) '(1 2 3))"), "(2 3)");
    assert_eq!(eval_expr("(reduce + '(1 2 3 4))"), "10");
    assert_eq!(eval_expr("(reduce + nil)"), "nil");
    assert_eq!(eval_expr("(range 4)"), "(0 1 2 3)");
    assert_eq!(eval_expr("(range 1 7 2)"), "(1 3 5)");
    assert_eq!(eval_expr("(substring \"hello\" 1 3)"), "\"el\"");
    assert_eq!(eval_expr("(map (lambda (c) c) \"ab\")"), "(\"a\" \"b\")");
}

#[test]
fn test_eq_and_equal() {
    assert_eq!(eval_expr("(eq 'a 'a)"), "t");
    assert_eq!(eval_expr("(eq 'a 'b)"), "nil");
    assert_eq!(eval_expr("(eq 42 42)"), "t");
    assert_eq!(eval_expr("(eq nil nil)"), "t");
    assert_eq!(eval_expr("(eq '(1) '(1))"), "nil");
    assert_eq!(eval_expr("(define l '(1)) (eq l l)"), "t");
    assert_eq!(eval_expr("(equal '(1 (2)) '(1 (2)))"), "t");
    assert_eq!(eval_expr("(equal \"a\" \"a\")"), "t");
}

#[test]
fn test_apply_and_eval() {
    assert_eq!(eval_expr("(apply + '(1 2 3))"), "6");
    assert_eq!(eval_expr("(apply (lambda (a b) (cons a b)) '(1 2))"), "(1 . 2)");
    assert_eq!(eval_expr("(eval '(+ 1 2))"), "3");
    assert!(matches!(eval_err("(apply 1 '(2))"), LispError::UndefinedFunction(_)));
}

#[test]
fn test_gensym_is_fresh() {
    assert_eq!(eval_expr("(symbolp (gensym))"), "t");
    assert_eq!(eval_expr("(eq (gensym) (gensym))"), "nil");
}

#[test]
fn test_deep_recursion_reports_stack_exhausted() {
    let engine = Engine::with_config(
        EngineConfig::new()
            .without_init_file()
            .max_eval_depth(64),
    )
    .unwrap();
    engine.evaluate("(defun down (n) (if (= n 0) 0 (down (- n 1))))").unwrap();
    assert!(matches!(
        engine.evaluate("(down 1000)"),
        Err(LispError::StackExhausted { depth: 64 })
    ));
    // The engine stays usable after the failure
    assert_eq!(engine.evaluate("(down 5)").unwrap(), Value::Number(0.0));
}

// Spawned threads get 2 MiB of stack; recursion must end in an error, not an abort
fn on_small_stack<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn test_default_depth_limit_holds_on_small_stack() {
    on_small_stack(|| {
        let engine = engine();
        engine
            .evaluate("(defun f (n) (if (= n 0) 0 (+ 1 (f (- n 1)))))")
            .unwrap();
        assert!(matches!(
            engine.evaluate("(f 100000)"),
            Err(LispError::StackExhausted { .. })
        ));
        assert_eq!(engine.evaluate("(f 50)").unwrap(), Value::Number(50.0));
    });
}

#[test]
fn test_deeply_nested_source_is_stack_exhausted() {
    on_small_stack(|| {
        let engine = engine();
        let source = format!("'{}{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(
            engine.evaluate(&source),
            Err(LispError::StackExhausted { .. })
        ));
        assert_eq!(engine.evaluate("(+ 1 2)").unwrap(), Value::Number(3.0));
    });
}

#[test]
fn test_deep_car_nesting_drops_without_overflow() {
    on_small_stack(|| {
        let engine = engine();
        let result = engine
            .evaluate(
                "(define x nil) (define i 0)
                 (while (< i 200000) (setq x (list x)) (setq i (+ i 1)))
                 1",
            )
            .unwrap();
        assert_eq!(result, Value::Number(1.0));
        drop(engine);
    });
}

#[test]
fn test_deep_car_nesting_compares_and_prints() {
    on_small_stack(|| {
        let nest = |depth: usize| {
            let mut value = Value::Nil;
            for _ in 0..depth {
                value = Value::list([value]);
            }
            value
        };
        let a = nest(20_000);
        let b = nest(20_000);
        assert_eq!(a, b);
        assert_ne!(a, nest(19_999));
        assert_eq!(a.to_string().len(), 2 * 20_000 + 3);
    });
}

#[test]
fn test_range_near_float_precision_limit() {
    assert_eq!(
        eval_expr("(length (range 9007199254740992 9007199254740994))"),
        "2"
    );
    assert!(matches!(
        eval_err("(range 0 1e300)"),
        LispError::InvalidOperation { .. }
    ));
}

#[test]
fn test_non_finite_numbers_print_as_symbols() {
    // These print as inf/NaN and read back as symbols, not numbers
    assert_eq!(eval_expr("(* 1e308 10)"), "inf");
    assert_eq!(eval_expr("(- 0 (* 1e308 10))"), "-inf");
    assert_eq!(eval_expr("(symbolp (car '(inf)))"), "t");
}
