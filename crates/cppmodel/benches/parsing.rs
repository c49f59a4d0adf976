//! Benchmarks for the C++ model extractor

use cppmodel::CppModelExtractor;
use cppmodel_api::{ModelExtractor, ParserConfig, TranslationUnit};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::Path;

const SAMPLE_CODE: &str = r#"
#include <vector>
#include <memory>

namespace myproject {

/// A growable container.
/// @tparam T Element type.
template<typename T>
class Container {
public:
    Container() = default;
    ~Container() = default;

    /// Append an item.
    /// @param item The item to append.
    void add(T item);

    T& get(size_t index);

    size_t size() const {
        return items.size();
    }

private:
    std::vector<T> items;
};

class Base {
public:
    virtual ~Base() = default;
    virtual void process() = 0;
};

class Left : public virtual Base {};
class Right : public virtual Base {};

class Derived : public Left, public Right {
public:
    void process() override;
};

void Derived::process() {}

struct Flags {
    unsigned mode : 2;
    unsigned level : 6;
    int count;
};

extern "C" {
int helper(int x);
}

} // namespace myproject
"#;

fn benchmark_extract_source(c: &mut Criterion) {
    let extractor = CppModelExtractor::new();

    c.bench_function("cpp_extract_source", |b| {
        b.iter(|| {
            extractor
                .extract_source(black_box(SAMPLE_CODE), Path::new("bench.cpp"))
                .unwrap()
        })
    });
}

fn benchmark_merge_units(c: &mut Criterion) {
    let units: Vec<TranslationUnit> = (0..16)
        .map(|i| TranslationUnit::in_memory(format!("unit{}.cpp", i), SAMPLE_CODE))
        .collect();

    let parallel = CppModelExtractor::new();
    c.bench_function("cpp_merge_16_units_parallel", |b| {
        b.iter(|| parallel.extract_units(black_box(&units)).unwrap())
    });

    let sequential = CppModelExtractor::with_config(ParserConfig::default().with_parallel(false));
    c.bench_function("cpp_merge_16_units_sequential", |b| {
        b.iter(|| sequential.extract_units(black_box(&units)).unwrap())
    });
}

criterion_group!(benches, benchmark_extract_source, benchmark_merge_units);
criterion_main!(benches);
