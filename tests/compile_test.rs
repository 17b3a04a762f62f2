// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

mod helpers;

use helpers::{create_test_vm, eval, eval_fresh, output_after, output_of};
use tokforth::{Mode, VmError};

// Test counted loops
#[test]
fn test_do_loop() -> Result<(), VmError> {
    assert_eq!(eval_fresh(": test 5 0 do i loop ; test")?, [0, 1, 2, 3, 4]);
    assert_eq!(eval_fresh(": sum 0 10 0 do i + loop ; sum")?, [45]);
    Ok(())
}

#[test]
fn test_plus_loop() -> Result<(), VmError> {
    assert_eq!(eval_fresh(": evens 10 0 do i 2 +loop ; evens")?, [0, 2, 4, 6, 8]);
    assert_eq!(eval_fresh(": down 0 3 do i -1 +loop ; down")?, [3, 2, 1, 0]);
    Ok(())
}

#[test]
fn test_nested_loops() -> Result<(), VmError> {
    let stack = eval_fresh(": grid 3 1 do 3 1 do j i * loop loop ; grid")?;
    assert_eq!(stack, [1, 2, 2, 4]);
    Ok(())
}

#[test]
fn test_leave() -> Result<(), VmError> {
    assert_eq!(eval_fresh(": find5 10 0 do i 5 = if i leave then loop ; find5")?, [5]);
    assert_eq!(eval_fresh(": t 10 0 do i 3 = if leave then loop 99 ; t")?, [99]);
    Ok(())
}

// Test conditionals
#[test]
fn test_if_else_then() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate(": sign dup 0< if drop -1 else 0> if 1 else 0 then then ;")?;
    assert_eq!(eval(&mut vm, "-5 sign 0 sign 9 sign")?, [-1, 0, 1]);
    Ok(())
}

#[test]
fn test_begin_loops() -> Result<(), VmError> {
    assert_eq!(eval_fresh(": cnt 0 begin dup 5 < while 1+ repeat ; cnt")?, [5]);
    assert_eq!(
        eval_fresh(": f 0 begin 1+ dup 3 = if exit then again ; f")?,
        [3]
    );
    Ok(())
}

#[test]
fn test_recursion() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate(": fact dup 1 > if dup 1 - fact * then ;")?;
    assert_eq!(eval(&mut vm, "5 fact")?, [120]);
    Ok(())
}

#[test]
fn test_shadowing() -> Result<(), VmError> {
    let stack = eval_fresh(": foo 1 ; : bar foo ; : foo 2 ; foo bar")?;
    assert_eq!(stack, [2, 1]);
    Ok(())
}

#[test]
fn test_immediate_word() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate(": now 99 ; immediate")?;
    assert_eq!(eval(&mut vm, ": t now ;")?, [99]);
    assert_eq!(eval(&mut vm, "t")?, [99]);
    Ok(())
}

// Test defining words
#[test]
fn test_create_does() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate(": make-var create 0 , does> ;")?;
    assert_eq!(eval(&mut vm, "make-var foo 42 foo ! foo @")?, [42]);
    vm.reset()?;
    assert_eq!(eval(&mut vm, "' foo >body foo =")?, [-1]);
    Ok(())
}

#[test]
fn test_does_with_arguments() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate(": adder create , does> @ + ;")?;
    vm.evaluate("10 adder add10 3 adder add3")?;
    assert_eq!(eval(&mut vm, "5 add10 5 add3")?, [15, 8]);
    Ok(())
}

#[test]
fn test_does_with_loop() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate(": summer create , does> @ 0 swap 0 do i + loop ;")?;
    vm.evaluate("4 summer sum4")?;
    assert_eq!(eval(&mut vm, "sum4 sum4")?, [6, 6]);
    Ok(())
}

#[test]
fn test_does_errors() -> Result<(), VmError> {
    assert!(matches!(eval_fresh("create foo does>"), Err(VmError::Compile(_))));

    let mut vm = create_test_vm()?;
    vm.evaluate(": bad does> ; : plain 1 ;")?;
    assert!(matches!(vm.evaluate("bad"), Err(VmError::Compile(_))));
    Ok(())
}

#[test]
fn test_variable_and_constant() -> Result<(), VmError> {
    assert_eq!(eval_fresh("variable x 5 x ! x @ 3 x +! x @")?, [5, 8]);
    assert_eq!(eval_fresh("7 constant seven seven seven +")?, [14]);
    assert_eq!(eval_fresh("create pair 1 , 2 , pair @ pair cell+ @")?, [1, 2]);
    Ok(())
}

#[test]
fn test_value_and_to() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    assert_eq!(eval(&mut vm, "5 value v v 10 to v v")?, [5, 10]);
    vm.reset()?;
    vm.evaluate(": setv to v ;")?;
    assert_eq!(eval(&mut vm, "20 setv v")?, [20]);
    Ok(())
}

#[test]
fn test_defer_and_is() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate("defer greet : hi 42 ; ' hi is greet")?;
    assert_eq!(eval(&mut vm, "greet")?, [42]);
    Ok(())
}

// Test compile-time words
#[test]
fn test_tick_in_definition() -> Result<(), VmError> {
    assert_eq!(eval_fresh(": t ['] dup execute ; 3 t")?, [3, 3]);
    Ok(())
}

#[test]
fn test_postpone() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate(": my-if postpone if ; immediate")?;
    vm.evaluate(": t my-if 1 else 2 then ;")?;
    assert_eq!(eval(&mut vm, "0 t 5 t")?, [2, 1]);
    vm.reset()?;

    vm.evaluate(": compile-dup postpone dup ; immediate")?;
    assert_eq!(eval(&mut vm, ": t2 5 compile-dup ; t2")?, [5, 5]);
    vm.reset()?;

    assert_eq!(eval(&mut vm, ": t3 1 if 5 endif ; t3")?, [5]);
    Ok(())
}

#[test]
fn test_postpone_string_words() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate(": my-s postpone s\" ; immediate")?;
    vm.evaluate(": t my-s hello\" type ;")?;
    assert_eq!(output_after(&mut vm, "t")?, "hello");

    vm.evaluate(": my-c postpone c\" ; immediate")?;
    vm.evaluate(": t2 my-c abc\" count type ;")?;
    assert_eq!(output_after(&mut vm, "t2")?, "abc");
    Ok(())
}

#[test]
fn test_postpone_postpone() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate(": pp postpone postpone ; immediate")?;
    vm.evaluate(": cdup pp dup ; immediate")?;
    assert_eq!(eval(&mut vm, ": t 5 cdup ; t")?, [5, 5]);
    Ok(())
}

#[test]
fn test_literal_and_brackets() -> Result<(), VmError> {
    assert_eq!(eval_fresh(": t [ 3 4 + ] literal ; t")?, [7]);
    assert_eq!(eval_fresh(": a [char] A ; a")?, [65]);
    assert_eq!(eval_fresh("char z char Z")?, [122, 90]);
    Ok(())
}

#[test]
fn test_state_tracks_mode() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    assert_eq!(eval(&mut vm, ": t [ state @ ] literal ; t state @")?, [0, 0]);
    vm.evaluate(": unfinished")?;
    assert_eq!(vm.mode(), Mode::Compiling);
    Ok(())
}

#[test]
fn test_strings() -> Result<(), VmError> {
    assert_eq!(output_of(": hi s\" hello\" type ; hi")?, "hello");
    assert_eq!(output_of(": hi c\" abc\" count type ; hi")?, "abc");
    assert_eq!(output_of("s\" direct\" type")?, "direct");
    assert_eq!(eval_fresh(": n s\" four\" swap drop ; n")?, [4]);
    Ok(())
}

#[test]
fn test_comments() -> Result<(), VmError> {
    assert_eq!(eval_fresh("1 ( two ) 3 \\ 4")?, [1, 3]);
    assert_eq!(eval_fresh(": t ( n -- n ) 1+ ; 1 t")?, [2]);
    Ok(())
}

// Test compile errors
#[test]
fn test_control_word_mismatches() -> Result<(), VmError> {
    assert!(matches!(eval_fresh(";"), Err(VmError::Compile(_))));
    assert!(matches!(eval_fresh("if"), Err(VmError::Compile(_))));
    assert!(matches!(eval_fresh(": x then ;"), Err(VmError::Compile(_))));
    assert!(matches!(eval_fresh(": x loop ;"), Err(VmError::Compile(_))));
    assert!(matches!(eval_fresh(": x begin 1 repeat ;"), Err(VmError::Compile(_))));
    assert!(matches!(eval_fresh(": x 1 if ;"), Err(VmError::Compile(_))));
    assert!(matches!(eval_fresh(": x 5 0 do ;"), Err(VmError::Compile(_))));
    Ok(())
}

#[test]
fn test_recovers_after_compile_error() -> Result<(), VmError> {
    let mut vm = create_test_vm()?;
    assert!(vm.evaluate(": x 1 if ;").is_err());
    vm.reset()?;
    assert_eq!(vm.mode(), Mode::Executing);
    assert_eq!(eval(&mut vm, ": y 1 if 2 then ; y")?, [2]);
    Ok(())
}

#[test]
fn test_branch_out_of_range() -> Result<(), VmError> {
    let filler = "1 drop ".repeat(100);
    let mut source = String::from(": big 1 if\n");
    for _ in 0..120 {
        source.push_str(&filler);
        source.push('\n');
    }
    source.push_str("then ;");
    let result = eval_fresh(&source);
    assert!(
        matches!(&result, Err(VmError::Compile(message)) if message.contains("out of range")),
        "{result:?}"
    );
    Ok(())
}
