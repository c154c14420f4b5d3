use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use walkdir::WalkDir;

use omniscan::{reader::GrayLuminanceSource, BarcodeReader, DecodeHints};

mod utils;
use utils::*;

// Images sit next to a .txt holding the expected text, one folder per symbology
fn benchmark(dataset_dir: &Path) {
    let image_paths: Vec<_> = WalkDir::new(dataset_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(is_image_file)
        .map(|e| e.path().to_path_buf())
        .collect();

    let results = Arc::new(Mutex::new(HashMap::<String, HashMap<String, u128>>::new()));
    let runtimes = Arc::new(Mutex::new(HashMap::<String, Vec<u128>>::new()));

    image_paths.par_iter().for_each(|img_path| {
        let parent = get_parent(img_path);
        let Ok(img) = image::open(img_path) else {
            return;
        };
        let gray = img.to_luma8();
        let exp_msg = parse_expected_decode_result(&img_path.with_extension("txt"));

        for angle in [0, 90, 180, 270] {
            let Ok(source) = GrayLuminanceSource::from_gray_image(&rotate(&gray, angle)) else {
                continue;
            };
            let mut hints = DecodeHints::new();
            hints.try_harder(true);

            let start = Instant::now();
            let res = BarcodeReader::new(hints).decode(&source);
            let elapsed = start.elapsed().as_micros();
            runtimes.lock().unwrap().entry(parent.clone()).or_default().push(elapsed);

            let Ok(barcode) = res else {
                continue;
            };
            let msg = barcode.text().lines().map(String::from).collect::<Vec<_>>();
            if msg == exp_msg {
                let mut results = results.lock().unwrap();
                *results.entry(parent.clone()).or_default().entry(angle.to_string()).or_default() += 1;
            }
        }
    });

    let mut results = Arc::try_unwrap(results).unwrap().into_inner().unwrap();
    let mut runtimes = Arc::try_unwrap(runtimes).unwrap().into_inner().unwrap();

    let mut total: HashMap<String, u128> = HashMap::new();
    for (k, runtime) in runtimes.iter_mut() {
        let v = results.entry(k.clone()).or_default();
        let total_for_folder = v.values().sum::<u128>();
        v.insert("total".to_string(), total_for_folder);
        v.insert("median_time".to_string(), median(runtime));
        v.insert("avg_time".to_string(), runtime.iter().sum::<u128>() / runtime.len().max(1) as u128);
        for (kc, vc) in v.iter() {
            *total.entry(kc.to_string()).or_default() += vc;
        }
    }
    let folders = results.len().max(1) as u128;
    for key in ["median_time", "avg_time"] {
        if let Some(t) = total.get_mut(key) {
            *t /= folders;
        }
    }
    results.insert("total".to_string(), total);

    let mut rows = results.keys().map(|s| s.as_str()).collect::<Vec<_>>();
    rows.sort_unstable();
    let cols = ["Angles", "0", "90", "180", "270", "total", "median_time", "avg_time"];

    println!("\nResult:");
    print_table(&results, &rows, &cols);
}

fn main() {
    let dataset_dir = Path::new("benches/dataset/decoding");

    let start = Instant::now();
    benchmark(dataset_dir);
    println!("Time elapsed: {:?}", start.elapsed());
}
