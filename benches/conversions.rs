use criterion::{Criterion, black_box, criterion_group, criterion_main};
use gpslogger::LatLon;
use gpslogger::gps::GpsReport;
use gpslogger::units::{decimal_to_dms, great_circle_feet, parse_numeric_or_default};

const TPV_LINE: &str = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":3,"time":"2024-01-15T17:30:00.000Z","ept":0.005,"lat":40.712776,"lon":-74.005974,"alt":10.4,"epx":3.2,"epy":4.1,"epv":9.8,"track":87.2,"speed":12.5,"climb":0.1}"#;

fn bench_units(c: &mut Criterion) {
    let mut group = c.benchmark_group("units");

    let a = LatLon::new(40.712776, -74.005974);
    let b = LatLon::new(40.713100, -74.004100);

    group.bench_function("great_circle_feet", |bench| {
        bench.iter(|| great_circle_feet(black_box(a), black_box(b)));
    });

    group.bench_function("decimal_to_dms", |bench| {
        bench.iter(|| decimal_to_dms(black_box(-74.005974)));
    });

    group.bench_function("parse_numeric_or_default", |bench| {
        bench.iter(|| {
            parse_numeric_or_default(black_box("40.712776"), 0.0)
                + parse_numeric_or_default(black_box("NaN"), 0.0)
        });
    });

    group.finish();
}

fn bench_report_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("gpsd");

    group.bench_function("decode_tpv", |bench| {
        bench.iter(|| serde_json::from_str::<GpsReport>(black_box(TPV_LINE)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_units, bench_report_decoding);
criterion_main!(benches);
