// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

// Tests for the arena, the stacks and the dictionary built on top of them
use tokforth::codec;
use tokforth::dict::{DictError, Dictionary, Lookup};
use tokforth::mem::{CELL_SIZE, Memory, MemoryError};
use tokforth::stack::Stack;

// Test utility setup
fn setup_memory() -> Memory {
    let mut memory = Memory::new(1024);
    // keep address 0 out of the dictionary, it marks the end of the chain
    memory.reserve(CELL_SIZE).ok();
    memory
}

#[test]
fn test_comma_and_fetch() -> Result<(), MemoryError> {
    let mut memory = setup_memory();
    let start = memory.here();
    memory.comma(-123456)?;
    memory.comma_byte(7)?;
    memory.comma_short(-300)?;
    let len = memory.comma_varint(-900)?;

    assert_eq!(memory.cell(start)?, -123456);
    assert_eq!(memory.byte(start + CELL_SIZE)?, 7);
    assert_eq!(memory.short(start + CELL_SIZE + 1)?, -300);
    assert_eq!(memory.varint(start + CELL_SIZE + 3)?, (-900, len));
    assert_eq!(memory.here(), start + CELL_SIZE + 3 + len);
    Ok(())
}

#[test]
fn test_bounds() {
    let mut memory = setup_memory();
    assert_eq!(memory.cell(1020), Err(MemoryError::OutOfBounds(1020)));
    assert_eq!(memory.byte(1024), Err(MemoryError::OutOfBounds(1024)));
    assert_eq!(
        memory.reserve(2048),
        Err(MemoryError::OutOfMemory {
            requested: (2048 + CELL_SIZE) as i64,
            capacity: 1024
        })
    );
    assert!(memory.allot(-4096).is_err());
    assert!(memory.copy_within(1000, 0, 100).is_err());
}

#[test]
fn test_allot() -> Result<(), MemoryError> {
    let mut memory = setup_memory();
    let start = memory.allot(16)?;
    assert_eq!(memory.here(), start + 16);
    memory.allot(-16)?;
    assert_eq!(memory.here(), start);
    Ok(())
}

#[test]
fn test_varint_sizes() {
    assert_eq!(codec::encode(0).len(), 1);
    assert_eq!(codec::encode(-64).len(), 1);
    assert_eq!(codec::encode(64).len(), 2);
    assert_eq!(codec::decode(&codec::encode(300)), Some((300, 2)));
    assert_eq!(codec::encoded_len(-100000), codec::encode(-100000).len());
}

#[test]
fn test_stack() -> Result<(), MemoryError> {
    let mut stack = Stack::with_capacity(2 * CELL_SIZE);
    for value in 1..=5 {
        stack.push(value);
    }
    assert_eq!(stack.depth(), 5);
    assert_eq!(stack.pick(4)?, 1);
    assert_eq!(stack.iter().collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
    assert_eq!(stack.pop()?, 5);
    stack.drop_n(3)?;
    assert_eq!(stack.peek()?, 1);
    assert_eq!(stack.drop_n(2), Err(MemoryError::StackUnderflow));
    stack.clear();
    assert_eq!(stack.pop(), Err(MemoryError::StackUnderflow));
    Ok(())
}

#[test]
fn test_dictionary_find() -> Result<(), DictError> {
    let mut memory = setup_memory();
    let mut dict = Dictionary::new();

    let foo = dict.add(&mut memory, b"Foo")?;
    assert_eq!(foo, memory.here());
    memory.comma_byte(0)?;
    let bar = dict.add(&mut memory, b"bar")?;
    dict.set_immediate(&mut memory)?;

    assert_eq!(dict.find(&memory, b"FOO")?, Lookup::Normal(foo));
    assert_eq!(dict.find(&memory, b"bar")?, Lookup::Immediate(bar));
    assert_eq!(dict.find(&memory, b"baz")?, Lookup::NotFound);
    assert_eq!(dict.last_xt(&memory)?, bar);
    Ok(())
}

#[test]
fn test_dictionary_shadowing() -> Result<(), DictError> {
    let mut memory = setup_memory();
    let mut dict = Dictionary::new();
    let first = dict.add(&mut memory, b"foo")?;
    let second = dict.add(&mut memory, b"foo")?;
    assert_ne!(first, second);
    assert_eq!(dict.find(&memory, b"foo")?, Lookup::Normal(second));

    let names: Vec<String> = dict.entries(&memory)?.into_iter().map(|entry| entry.name).collect();
    assert_eq!(names, ["foo", "foo"]);
    Ok(())
}

#[test]
fn test_dictionary_errors() {
    let mut memory = setup_memory();
    let mut dict = Dictionary::new();
    assert_eq!(dict.last_xt(&memory), Err(DictError::Empty));
    assert_eq!(dict.set_immediate(&mut memory), Err(DictError::Empty));
    assert_eq!(dict.add(&mut memory, b""), Err(DictError::EmptyName));
    let long = vec![b'x'; 200];
    assert!(matches!(dict.add(&mut memory, &long), Err(DictError::NameTooLong(_))));
}
