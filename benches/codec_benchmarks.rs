use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use ton_burn_relayer::domain::TonAddress;
use ton_burn_relayer::infra::ton::messages::OutboundBody;

fn bench_codec(c: &mut Criterion) {
    let body = OutboundBody::Swap {
        query_id: 42,
        offer_nanotons: 800_000_000,
        min_ask_units: 68_400,
        recipient: TonAddress::new(0, [7u8; 32]),
    };
    let encoded = body.encode();

    c.bench_function("encode_swap_body", |b| {
        b.iter(|| {
            let _ = black_box(&body).encode();
        })
    });

    c.bench_function("decode_swap_body", |b| {
        b.iter(|| {
            let _ = OutboundBody::decode(black_box(&encoded));
        })
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
