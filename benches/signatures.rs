//! Benchmarks for blob decoding.
//!
//! Covers the two blob formats the reader interprets while materialising module metadata:
//! - `TypeSpec` signatures of generic instantiations (`IHandler<int>`, `IMap<K, V>`)
//! - Custom attribute values carrying a single string argument
//!
//! plus the compressed integer encoding both of them are built on.

extern crate modscope;

use criterion::{criterion_group, criterion_main, Criterion};
use modscope::{
    metadata::signatures::{decode_type_def_or_ref, parse_generic_instance, parse_string_attribute},
    Parser,
};
use std::hint::black_box;

/// Benchmark decoding a single-argument generic instantiation.
/// Signature: class IHandler`1<int32>
fn bench_generic_instance_single(c: &mut Criterion) {
    // GENERICINST CLASS TypeRef(3) 1 I4
    let signature = [0x15, 0x12, 0x0D, 0x01, 0x08];

    c.bench_function("sig_generic_instance_single", |b| {
        b.iter(|| {
            let instance = parse_generic_instance(black_box(&signature)).unwrap();
            black_box(instance)
        });
    });
}

/// Benchmark decoding a generic value type instantiation with a two-byte coded index.
/// Signature: valuetype Pair`2<string, object>
fn bench_generic_instance_wide_index(c: &mut Criterion) {
    // GENERICINST VALUETYPE TypeDef(0x100) 2 STRING OBJECT
    let signature = [0x15, 0x11, 0x84, 0x00, 0x02, 0x0E, 0x1C];

    c.bench_function("sig_generic_instance_wide_index", |b| {
        b.iter(|| {
            let instance = parse_generic_instance(black_box(&signature)).unwrap();
            black_box(instance)
        });
    });
}

/// Benchmark rejecting a `TypeSpec` that is not a generic instantiation.
/// Signature: int32[]
fn bench_generic_instance_rejected(c: &mut Criterion) {
    // SZARRAY I4
    let signature = [0x1D, 0x08];

    c.bench_function("sig_generic_instance_rejected", |b| {
        b.iter(|| {
            let result = parse_generic_instance(black_box(&signature));
            black_box(result.is_err())
        });
    });
}

/// Benchmark decoding `TypeDefOrRefOrSpecEncoded` values of every tag.
fn bench_type_def_or_ref(c: &mut Criterion) {
    let encoded = [0x08_u32, 0x0D, 0x0A, 0x4001];

    c.bench_function("sig_type_def_or_ref", |b| {
        b.iter(|| {
            for value in encoded {
                black_box(decode_type_def_or_ref(black_box(value)).unwrap());
            }
        });
    });
}

/// Benchmark decoding a short string attribute.
/// Attribute: [Plugin("Tools")]
fn bench_string_attribute_short(c: &mut Criterion) {
    let blob = [0x01, 0x00, 0x05, b'T', b'o', b'o', b'l', b's', 0x00, 0x00];

    c.bench_function("attr_string_short", |b| {
        b.iter(|| {
            let value = parse_string_attribute(black_box(&blob)).unwrap();
            black_box(value)
        });
    });
}

/// Benchmark decoding a string attribute whose length needs a two-byte prefix.
/// Attribute: [TargetFramework(".NETCoreApp,Version=v8.0 ...")]
fn bench_string_attribute_long(c: &mut Criterion) {
    let text = ".NETCoreApp,Version=v8.0".repeat(8);
    let length = u16::try_from(text.len()).unwrap() | 0x8000;

    let mut blob = vec![0x01, 0x00];
    blob.extend_from_slice(&length.to_be_bytes());
    blob.extend_from_slice(text.as_bytes());
    blob.extend_from_slice(&[0x00, 0x00]);

    c.bench_function("attr_string_long", |b| {
        b.iter(|| {
            let value = parse_string_attribute(black_box(&blob)).unwrap();
            black_box(value)
        });
    });
}

/// Benchmark decoding a null string attribute.
fn bench_string_attribute_null(c: &mut Criterion) {
    let blob = [0x01, 0x00, 0xFF, 0x00, 0x00];

    c.bench_function("attr_string_null", |b| {
        b.iter(|| {
            let value = parse_string_attribute(black_box(&blob)).unwrap();
            black_box(value)
        });
    });
}

/// Benchmark reading a run of compressed unsigned integers of mixed widths.
fn bench_compressed_uint(c: &mut Criterion) {
    // 0x03, 0x3FFF, 0x1FFFFFFF, 0x7F
    let data = [0x03, 0xBF, 0xFF, 0xDF, 0xFF, 0xFF, 0xFF, 0x7F];

    c.bench_function("compressed_uint_mixed", |b| {
        b.iter(|| {
            let mut parser = Parser::new(black_box(&data));
            let mut sum = 0_u64;
            while parser.remaining() > 0 {
                sum += u64::from(parser.read_compressed_uint().unwrap());
            }
            black_box(sum)
        });
    });
}

criterion_group!(
    benches,
    // TypeSpec signatures
    bench_generic_instance_single,
    bench_generic_instance_wide_index,
    bench_generic_instance_rejected,
    bench_type_def_or_ref,
    // Custom attribute values
    bench_string_attribute_short,
    bench_string_attribute_long,
    bench_string_attribute_null,
    // Encoding primitives
    bench_compressed_uint,
);
criterion_main!(benches);
