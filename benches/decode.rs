use bitform::decode::decode;
use bitform::schema::Schema;
use criterion::{Criterion, criterion_group, criterion_main};

fn gen_schema(field_count: usize) -> Schema {
    let mut doc = String::from("meta:\n  endian: le\nseq:\n");
    for i in 0..field_count {
        doc.push_str(&format!("  - id: f{}\n    type: u2\n", i));
    }
    Schema::parse_str(&doc).unwrap()
}

fn gen_packet(total_bytes: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(total_bytes);

    // Deterministic but non-trivial pattern
    for i in 0..total_bytes {
        data.push((i * 31 % 256) as u8);
    }

    data
}

fn bench_decode(c: &mut Criterion) {
    for &field_count in &[1usize, 10, 50, 100] {
        let schema = gen_schema(field_count);
        let packet = gen_packet(field_count * 2);

        c.bench_function(&format!("decode_{}_fields", field_count), |b| {
            b.iter(|| {
                let _ = decode(&schema, &packet).unwrap();
            })
        });
    }

    let schema = Schema::parse_str(
        "
seq:
  - id: n
    type: u1
  - id: xs
    type: u1
    repeat: expr
    repeat-expr: n
",
    )
    .unwrap();
    let mut packet = vec![200u8];
    packet.extend((0..200).map(|i| i as u8));

    c.bench_function("decode_repeat_200", |b| {
        b.iter(|| {
            let _ = decode(&schema, &packet).unwrap();
        })
    });
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
