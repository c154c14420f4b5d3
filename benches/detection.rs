use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use walkdir::WalkDir;

use omniscan::{reader::GrayLuminanceSource, Barcode, BarcodeReader};

mod utils;
use utils::*;

// Result points must fall inside the expected bounds grown by a tenth of their size
fn matches_bounds(barcode: &Barcode, exp: &[f32; 4]) -> bool {
    let Some((x0, y0, x1, y1)) = barcode.bounds() else {
        return false;
    };
    let slack_x = (exp[2] - exp[0]) / 10.0;
    let slack_y = (exp[3] - exp[1]) / 10.0;
    x0 >= exp[0] - slack_x && y0 >= exp[1] - slack_y && x1 <= exp[2] + slack_x && y1 <= exp[3] + slack_y
}

// Images sit next to a .txt of four corners per symbol. Scores are true positives,
// false positives and misses.
fn benchmark(dataset_dir: &Path) {
    let image_paths: Vec<_> = WalkDir::new(dataset_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(is_image_file)
        .map(|e| e.path().to_path_buf())
        .collect();

    let scores = Arc::new(Mutex::new(HashMap::<String, [usize; 3]>::new()));
    let runtimes = Arc::new(Mutex::new(HashMap::<String, Vec<u128>>::new()));

    image_paths.par_iter().for_each(|img_path| {
        let parent = get_parent(img_path);
        let Ok(img) = image::open(img_path) else {
            return;
        };
        let Ok(source) = GrayLuminanceSource::from_image(&img) else {
            return;
        };
        let exp_symbols = parse_expected_bounds_result(&img_path.with_extension("txt"));

        let start = Instant::now();
        let symbols = BarcodeReader::default().decode_multiple(&source).unwrap_or_default();
        let elapsed = start.elapsed().as_micros();

        let detected = exp_symbols.iter().filter(|exp| symbols.iter().any(|s| matches_bounds(s, exp))).count();
        let mut scores = scores.lock().unwrap();
        let score = scores.entry(parent.clone()).or_default();
        score[0] += detected;
        score[1] += symbols.len().saturating_sub(detected);
        score[2] += exp_symbols.len() - detected;
        runtimes.lock().unwrap().entry(parent).or_default().push(elapsed);
    });

    let scores = Arc::try_unwrap(scores).unwrap().into_inner().unwrap();
    let mut runtimes = Arc::try_unwrap(runtimes).unwrap().into_inner().unwrap();

    let mut results = HashMap::<String, HashMap<String, f64>>::new();
    let mut total = [0usize; 3];
    for (k, score) in scores.iter() {
        total.iter_mut().zip(score).for_each(|(t, s)| *t += s);
        let row = results.entry(k.clone()).or_default();
        row.insert("precision".to_string(), score[0] as f64 / (score[0] + score[1]).max(1) as f64);
        row.insert("recall".to_string(), score[0] as f64 / (score[0] + score[2]).max(1) as f64);
        let runtime = runtimes.get_mut(k).map(|r| median(r)).unwrap_or(0);
        row.insert("median_time".to_string(), runtime as f64);
    }
    let row = results.entry("total".to_string()).or_default();
    row.insert("precision".to_string(), total[0] as f64 / (total[0] + total[1]).max(1) as f64);
    row.insert("recall".to_string(), total[0] as f64 / (total[0] + total[2]).max(1) as f64);

    let mut rows = results.keys().map(|s| s.as_str()).collect::<Vec<_>>();
    rows.sort_unstable();
    let cols = ["Folder", "precision", "recall", "median_time"];

    println!("\nResult:");
    print_table(&results, &rows, &cols);
}

fn main() {
    let dataset_dir = Path::new("benches/dataset/detection");

    let start = Instant::now();
    benchmark(dataset_dir);
    println!("Time elapsed: {:?}", start.elapsed());
}
