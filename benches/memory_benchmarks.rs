// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tokforth::codec;
use tokforth::mem::{CELL_SIZE, Memory};
use tokforth::stack::Stack;

fn bench_varint(c: &mut Criterion) {
    let mut group = c.benchmark_group("VarInt Codec");

    group.bench_function("encode_small", |b| b.iter(|| codec::encode(black_box(42))));
    group.bench_function("encode_address", |b| {
        b.iter(|| codec::encode(black_box(200_000)))
    });

    let encoded = codec::encode(-100_000);
    group.bench_function("decode", |b| b.iter(|| codec::decode(black_box(&encoded))));

    group.finish();
}

fn bench_arena(c: &mut Criterion) {
    let mut group = c.benchmark_group("Arena Operations");

    // Compile-like workload: a stream of tokens with inline operands
    group.bench_function("comma_operands", |b| {
        b.iter_with_setup(
            || Memory::new(64 * 1024),
            |mut memory| {
                for i in 0..1000 {
                    memory.comma_byte(95).unwrap();
                    memory.comma_varint(i).unwrap();
                }
                black_box(memory.here())
            },
        )
    });

    group.bench_function("cell_read_write", |b| {
        let mut memory = Memory::new(64 * 1024);
        b.iter(|| {
            for i in 0..1000 {
                let at = i * CELL_SIZE;
                memory.set_cell(at, i as _).unwrap();
                black_box(memory.cell(at).unwrap());
            }
        })
    });

    group.bench_function("stack_push_pop", |b| {
        let mut stack = Stack::with_capacity(16 * 1024);
        b.iter(|| {
            for i in 0..1000 {
                stack.push(i);
            }
            while !stack.is_empty() {
                black_box(stack.pop().unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_varint, bench_arena);
criterion_main!(benches);
