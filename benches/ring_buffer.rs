//! Real-time path costs: ring copies, accumulator drains, PCM conversion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rtc_audio_pipeline::audio::{AudioFormat, ByteRingBuffer, CaptureAccumulator, PlaybackAccumulator, TypedRingBuffer};
use rtc_audio_pipeline::codec::pcm;

/// Device block sizes seen in practice (frames per callback)
const BLOCK_SIZES: [usize; 3] = [128, 441, 1024];

fn bench_byte_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("byte_ring");
    for &block in &BLOCK_SIZES {
        let bytes = block * 2 * 2;
        let data = vec![0x5au8; bytes];
        let mut out = vec![0u8; bytes];
        let mut ring = ByteRingBuffer::new(bytes * 3 + 7);

        group.throughput(Throughput::Bytes(bytes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(block), &block, |b, _| {
            b.iter(|| {
                ring.write(black_box(&data));
                ring.read(black_box(&mut out));
            })
        });
    }
    group.finish();
}

fn bench_typed_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("typed_ring");
    for &block in &BLOCK_SIZES {
        let data = vec![7i16; block * 2];
        let mut ring = TypedRingBuffer::<i16>::new(block * 5);

        group.throughput(Throughput::Elements(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(block), &block, |b, _| {
            b.iter(|| {
                ring.enqueue(black_box(&data));
                black_box(ring.try_dequeue(data.len()));
            })
        });
    }
    group.finish();
}

fn bench_capture_callback(c: &mut Criterion) {
    let format = AudioFormat::new(2, 48000);
    let block = vec![0.25f32; 441 * 2];
    let mut acc = CaptureAccumulator::new(200);

    c.bench_function("capture_callback_441", |b| {
        b.iter(|| {
            acc.write_f32(black_box(&block), format);
            while let Some(frame) = acc.read_duration(10) {
                black_box(frame);
            }
        })
    });
}

fn bench_playback_read(c: &mut Criterion) {
    let format = AudioFormat::new(2, 48000);
    let frame = vec![1000i16; 960];
    let mut out = vec![0.0f32; 960];
    let mut acc = PlaybackAccumulator::new(200);

    c.bench_function("playback_read_10ms", |b| {
        b.iter(|| {
            acc.write(black_box(&frame), format);
            if let Some(frame) = acc.read(format, 480) {
                pcm::decode_into(frame.samples(), &mut out);
            }
            black_box(&out);
        })
    });
}

criterion_group!(
    benches,
    bench_byte_ring,
    bench_typed_ring,
    bench_capture_callback,
    bench_playback_read
);
criterion_main!(benches);
