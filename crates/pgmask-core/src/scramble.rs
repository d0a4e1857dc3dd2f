use rand::Rng;

const LOWERCASE_SET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE_SET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMERIC_SET: &[u8] = b"0123456789";

/// Scramble a value while preserving its length and per-byte character
/// class: lowercase stays lowercase, uppercase stays uppercase, digits stay
/// digits, everything else is copied verbatim.
///
/// Backslash escape sequences are copied through untouched so the dump
/// format's encoding survives the rewrite: `\0`-`\7` opens an octal escape
/// of up to 3 digits, `\x`/`\u`/`\U` open hex escapes of up to 2/4/8 digits,
/// and any other escaped character passes as a single-char escape. The hex
/// digit class is `[0-9A-F]`, matching what the dump utility emits.
pub fn scramble_string(input: &str, rng: &mut impl Rng) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());

    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\\' => {
                out.push(c);
                i = pass_escape_sequence(&mut out, bytes, i + 1);
            }
            b'a'..=b'z' => out.push(random_from(LOWERCASE_SET, rng)),
            b'A'..=b'Z' => out.push(random_from(UPPERCASE_SET, rng)),
            b'0'..=b'9' => out.push(random_from(NUMERIC_SET, rng)),
            _ => out.push(c),
        }
        i += 1;
    }

    // ASCII replaces ASCII and everything else is copied, so the output is
    // valid UTF-8 whenever the input was.
    String::from_utf8_lossy(&out).into_owned()
}

/// Replace the input with asterisks, one per rune.
pub fn scrub_string(input: &str) -> String {
    "*".repeat(input.chars().count())
}

/// N random decimal digits.
pub fn random_digits(count: usize, rng: &mut impl Rng) -> String {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(random_from(NUMERIC_SET, rng));
    }
    String::from_utf8_lossy(&out).into_owned()
}

// Copies the escaped character, then any numeric tail it opens. Returns the
// index of the last consumed input byte; sequences cut short by end of input
// are the producer's problem and pass through as-is.
fn pass_escape_sequence(out: &mut Vec<u8>, input: &[u8], i: usize) -> usize {
    if i >= input.len() {
        return i - 1;
    }

    let c = input[i];
    out.push(c);

    match c {
        b'0'..=b'7' => pass_octal_sequence(out, input, i + 1),
        b'x' => pass_hex_sequence(out, input, i + 1, 2),
        b'u' => pass_hex_sequence(out, input, i + 1, 4),
        b'U' => pass_hex_sequence(out, input, i + 1, 8),
        _ => i,
    }
}

fn pass_octal_sequence(out: &mut Vec<u8>, input: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < start + 2 && i < input.len() {
        let c = input[i];
        if !(b'0'..=b'7').contains(&c) {
            break;
        }
        out.push(c);
        i += 1;
    }
    i - 1
}

fn pass_hex_sequence(out: &mut Vec<u8>, input: &[u8], start: usize, max_len: usize) -> usize {
    let mut i = start;
    while i < start + max_len && i < input.len() {
        let c = input[i];
        if !is_hex_digit(c) {
            break;
        }
        out.push(c);
        i += 1;
    }
    i - 1
}

fn is_hex_digit(c: u8) -> bool {
    c.is_ascii_digit() || (b'A'..=b'F').contains(&c)
}

fn random_from(set: &[u8], rng: &mut impl Rng) -> u8 {
    set[rng.gen_range(0..set.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn class_of(c: u8) -> u8 {
        match c {
            b'a'..=b'z' => b'l',
            b'A'..=b'Z' => b'u',
            b'0'..=b'9' => b'd',
            other => other,
        }
    }

    #[test]
    fn preserves_length_and_character_class() {
        let input = "ABC-1a2bC_x.y";
        let output = scramble_string(input, &mut rng());
        assert_eq!(output.len(), input.len());
        for (a, b) in input.bytes().zip(output.bytes()) {
            assert_eq!(class_of(a), class_of(b), "class mismatch in {output}");
        }
    }

    #[test]
    fn copies_non_ascii_bytes_verbatim() {
        let input = "né 日本 42";
        let output = scramble_string(input, &mut rng());
        assert_eq!(output.chars().filter(|c| !c.is_ascii()).collect::<String>(), "é日本");
        assert_eq!(output.len(), input.len());
    }

    #[test]
    fn is_deterministic_for_a_given_rng_state() {
        let a = scramble_string("Hello-123", &mut rng());
        let b = scramble_string("Hello-123", &mut rng());
        assert_eq!(a, b);
    }

    #[test]
    fn passes_single_char_escapes() {
        let output = scramble_string("ab\\ncd", &mut rng());
        assert_eq!(&output[2..4], "\\n");
        assert_eq!(output.len(), 6);
    }

    #[test]
    fn passes_octal_escapes_up_to_three_digits() {
        let output = scramble_string("\\101z", &mut rng());
        assert!(output.starts_with("\\101"));
        assert!(output.as_bytes()[4].is_ascii_lowercase());
        assert_eq!(output.len(), 5);

        // Octal run stops at the first non-octal digit.
        let output = scramble_string("\\19", &mut rng());
        assert!(output.starts_with("\\1"));
        assert!(output.as_bytes()[2].is_ascii_digit());
    }

    #[test]
    fn passes_hex_escapes() {
        let output = scramble_string("\\x4Fzz", &mut rng());
        assert!(output.starts_with("\\x4F"));
        assert_eq!(output.len(), 6);

        let output = scramble_string("\\u0041Q", &mut rng());
        assert!(output.starts_with("\\u0041"));
        assert_eq!(output.len(), 7);

        let output = scramble_string("\\U00000041", &mut rng());
        assert_eq!(&output[..10], "\\U00000041");
    }

    #[test]
    fn hex_class_is_uppercase_only() {
        // Lowercase 'f' is not part of the hex class, so it gets scrambled.
        let output = scramble_string("\\xff", &mut rng());
        assert!(output.starts_with("\\x"));
        assert!(output.as_bytes()[2].is_ascii_lowercase());
        assert!(output.as_bytes()[3].is_ascii_lowercase());
    }

    #[test]
    fn trailing_backslash_survives() {
        let output = scramble_string("ab\\", &mut rng());
        assert_eq!(output.len(), 3);
        assert!(output.ends_with('\\'));
    }

    #[test]
    fn scrub_counts_runes_not_bytes() {
        assert_eq!(scrub_string("foo"), "***");
        assert_eq!(scrub_string("日本語"), "***");
        assert_eq!(scrub_string(""), "");
    }

    #[test]
    fn random_digits_match_length_and_charset() {
        let output = random_digits(12, &mut rng());
        assert_eq!(output.len(), 12);
        assert!(output.bytes().all(|b| b.is_ascii_digit()));
    }
}
