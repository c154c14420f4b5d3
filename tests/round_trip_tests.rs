#[cfg(test)]
mod round_trip_proptests {
    use prop::string::string_regex;
    use proptest::prelude::*;

    use omniscan::{
        reader::BinaryBitmap, Barcode, BarcodeFormat, DecodeHints, EncodeHints, MultiFormatReader, MultiFormatWriter,
        ScanResult,
    };

    fn round_trip(content: &str, format: BarcodeFormat, width: usize, height: usize) -> ScanResult<Barcode> {
        let mut enc_hints = EncodeHints::new();
        if format == BarcodeFormat::Aztec {
            enc_hints.margin(2);
        }
        let m = MultiFormatWriter::new().encode(content, format, width, height, &enc_hints)?;
        let mut hints = DecodeHints::new();
        hints.possible_formats(&[format]);
        MultiFormatReader::new().decode(&BinaryBitmap::from_bit_matrix(&m)?, &hints)
    }

    fn gtin_check_digit(digits: &str) -> u32 {
        let sum: u32 =
            digits.bytes().enumerate().map(|(i, b)| (b - b'0') as u32 * if i % 2 == 0 { 3 } else { 1 }).sum();
        (10 - sum % 10) % 10
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn proptest_qr(data in string_regex("[ -~]{1,100}").unwrap()) {
            let b = round_trip(&data, BarcodeFormat::QrCode, 250, 250).unwrap();
            prop_assert_eq!(b.text(), data);
        }

        #[test]
        fn proptest_aztec(data in string_regex("[ -~]{1,80}").unwrap()) {
            let b = round_trip(&data, BarcodeFormat::Aztec, 300, 300).unwrap();
            prop_assert_eq!(b.text(), data);
        }

        #[test]
        fn proptest_maxicode(data in string_regex("[A-Za-z0-9]{1,30}").unwrap()) {
            let b = round_trip(&data, BarcodeFormat::MaxiCode, 300, 300).unwrap();
            prop_assert_eq!(b.text(), data);
        }

        #[test]
        fn proptest_itf(data in string_regex("([0-9]{2}){3,10}").unwrap()) {
            let b = round_trip(&data, BarcodeFormat::Itf, 0, 10).unwrap();
            prop_assert_eq!(b.text(), data);
        }

        #[test]
        fn proptest_code93(data in string_regex("[ -~]{1,30}").unwrap()) {
            let b = round_trip(&data, BarcodeFormat::Code93, 0, 10).unwrap();
            prop_assert_eq!(b.text(), data);
        }

        #[test]
        fn proptest_rss14(data in string_regex("[0-9]{13}").unwrap()) {
            let b = round_trip(&data, BarcodeFormat::Rss14, 300, 40).unwrap();
            prop_assert_eq!(b.text(), format!("{data}{}", gtin_check_digit(&data)));
        }

        #[test]
        fn proptest_rss_expanded(lot in string_regex("[0-9A-Za-z]{1,12}").unwrap()) {
            let data = format!("(10){lot}");
            let b = round_trip(&data, BarcodeFormat::RssExpanded, 0, 10).unwrap();
            prop_assert_eq!(b.text(), data);
        }
    }
}

#[cfg(test)]
mod round_trip_tests {
    use test_case::test_case;

    use omniscan::{
        qrcode::EcLevel,
        reader::{BinaryBitmap, GrayLuminanceSource},
        render::{to_image, RenderOptions},
        BarcodeFormat, BarcodeReader, DecodeHints, EncodeHints, ErrorCorrection, MultiFormatReader, MultiFormatWriter,
        ResultMetadataKey,
    };

    #[test_case("Hello, world!🌎", EcLevel::L; "qr_utf8_l")]
    #[test_case("TEST", EcLevel::M; "qr_alnum_m")]
    #[test_case("12345", EcLevel::Q; "qr_numeric_q")]
    #[test_case(&"A11111111111111".repeat(11), EcLevel::M; "qr_mixed_m")]
    #[test_case(&"1234567890".repeat(28), EcLevel::H; "qr_numeric_h")]
    #[test_case(&"aAAAAAAAAA1111111111111111AAAAAAAAAAa".repeat(4), EcLevel::Q; "qr_segments_q")]
    fn test_qr(data: &str, ec: EcLevel) {
        let mut hints = EncodeHints::new();
        hints.error_correction(ErrorCorrection::Qr(ec));
        let m = MultiFormatWriter::new().encode(data, BarcodeFormat::QrCode, 0, 0, &hints).unwrap();

        // Through the renderer and a real luminance source
        let img = to_image(&m, &RenderOptions::new(3));
        let source = GrayLuminanceSource::from_gray_image(&img).unwrap();
        let b = BarcodeReader::default().decode(&source).unwrap();
        assert_eq!(b.text(), data);
        assert_eq!(b.get_metadata(ResultMetadataKey::ErrorCorrectionLevel).and_then(|v| v.as_text()), Some(ec.to_string().as_str()));
    }

    #[test_case("(01)90012345678908")]
    #[test_case("(01)98898765432106(3202)012345(15)991231")]
    #[test_case("(21)abc-DEF(10)12")]
    #[test_case("(8200)http://ex.com/?q=1")]
    fn test_rss_expanded(data: &str) {
        let m = MultiFormatWriter::new().encode(data, BarcodeFormat::RssExpanded, 600, 20, &EncodeHints::default()).unwrap();
        let b = MultiFormatReader::new().decode(&BinaryBitmap::from_bit_matrix(&m).unwrap(), &DecodeHints::default()).unwrap();
        assert_eq!(b.text(), data);
        assert_eq!(b.format(), BarcodeFormat::RssExpanded);
    }

    #[test_case("2001234567890", "20012345678909")]
    #[test_case("04412345678909", "04412345678909")]
    fn test_rss14(data: &str, exp: &str) {
        let m = MultiFormatWriter::new().encode(data, BarcodeFormat::Rss14, 300, 40, &EncodeHints::default()).unwrap();
        let b = MultiFormatReader::new().decode(&BinaryBitmap::from_bit_matrix(&m).unwrap(), &DecodeHints::default()).unwrap();
        assert_eq!(b.text(), exp);
    }

    #[test_case("152382802\x1d840\x1d001\x1dParcel 1 of 2")]
    #[test_case("Standard symbol, mode 4")]
    fn test_maxicode(data: &str) {
        let m = MultiFormatWriter::new().encode(data, BarcodeFormat::MaxiCode, 300, 300, &EncodeHints::default()).unwrap();
        let mut hints = DecodeHints::new();
        hints.possible_formats(&[BarcodeFormat::MaxiCode]);
        let b = MultiFormatReader::new().decode(&BinaryBitmap::from_bit_matrix(&m).unwrap(), &hints).unwrap();
        assert_eq!(b.text(), data);
    }
}
