use crate::secrets::password::{generate, generate_default, DEFAULT_LENGTH};

#[test]
fn generated_passwords_hold_their_character_guarantees() {
    for _ in 0..10_000 {
        let pw = generate_default();

        assert_eq!(pw.len(), DEFAULT_LENGTH);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(pw.chars().filter(|c| c.is_ascii_lowercase()).count() >= 1);
        assert!(pw.chars().filter(|c| c.is_ascii_uppercase()).count() >= 1);
        assert!(pw.chars().filter(|c| c.is_ascii_digit()).count() >= 3);
    }
}

#[test]
fn special_mode_swaps_in_exactly_one_period() {
    for _ in 0..1_000 {
        let pw = generate(DEFAULT_LENGTH, true);

        assert_eq!(pw.len(), DEFAULT_LENGTH);
        assert_eq!(pw.chars().filter(|c| *c == '.').count(), 1);
        // the character-class guarantees still hold around the period
        assert!(pw.chars().filter(|c| c.is_ascii_lowercase()).count() >= 1);
        assert!(pw.chars().filter(|c| c.is_ascii_uppercase()).count() >= 1);
        assert!(pw.chars().filter(|c| c.is_ascii_digit()).count() >= 3);
    }
}

#[test]
fn tiny_requested_lengths_are_padded_to_fit_the_guarantees() {
    let pw = generate(1, false);
    assert_eq!(pw.len(), 5);

    let pw = generate(1, true);
    assert_eq!(pw.len(), 6);
}
