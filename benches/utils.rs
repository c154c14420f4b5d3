use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::path::Path;

use image::GrayImage;

pub fn is_image_file(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .map(|e| matches!(e.to_str(), Some("png" | "jpg" | "jpeg" | "bmp")))
            .unwrap_or(false)
}

pub fn get_parent(path: &Path) -> String {
    path.parent().and_then(|p| p.file_name()).and_then(|s| s.to_str()).unwrap_or("root").to_string()
}

pub fn rotate(gray: &GrayImage, angle: u32) -> GrayImage {
    match angle {
        90 => image::imageops::rotate90(gray),
        180 => image::imageops::rotate180(gray),
        270 => image::imageops::rotate270(gray),
        _ => gray.clone(),
    }
}

/// One expected text per line.
pub fn parse_expected_decode_result(path: &Path) -> Vec<String> {
    let exp_msg = std::fs::read_to_string(path).unwrap_or_default();
    exp_msg.lines().map(String::from).collect()
}

/// Axis aligned bounds of every expected symbol, given as four corners per symbol.
pub fn parse_expected_bounds_result(path: &Path) -> Vec<[f32; 4]> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    let numbers: Vec<f32> =
        content.lines().flat_map(|line| line.split_whitespace()).filter_map(|s| s.parse::<f32>().ok()).collect();

    numbers
        .chunks_exact(8)
        .map(|c| {
            let xs = [c[0], c[2], c[4], c[6]];
            let ys = [c[1], c[3], c[5], c[7]];
            let min = |v: [f32; 4]| v.iter().copied().fold(f32::MAX, f32::min);
            let max = |v: [f32; 4]| v.iter().copied().fold(f32::MIN, f32::max);
            [min(xs), min(ys), max(xs), max(ys)]
        })
        .collect()
}

pub fn median(values: &mut [u128]) -> u128 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2
    }
}

pub fn print_table<N>(result: &HashMap<String, HashMap<String, N>>, rows: &[&str], columns: &[&str])
where
    N: Display + Debug + Default,
{
    let cell_w = 15;
    let df = N::default();
    let divider = "-".repeat(columns.len() * (cell_w + 2) + 1);

    println!("{divider}");
    let mut header = String::from("| ");
    for c in columns {
        header.push_str(&format!("{c:<cell_w$}| "));
    }
    println!("{header}");
    println!("{divider}");

    for hr in rows {
        let Some(r) = result.get(&hr.to_string()) else {
            continue;
        };
        let mut row = format!("| {hr:<cell_w$}| ");
        for c in columns.iter().skip(1) {
            let cell = r.get(&c.to_string()).unwrap_or(&df);
            row.push_str(&format!("{:<cell_w$.2}| ", cell));
        }
        println!("{row}");
    }

    println!("{divider}");
}

#[allow(dead_code)]
fn main() {}
