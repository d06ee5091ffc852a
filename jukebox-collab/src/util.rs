use rand::{seq::SliceRandom, thread_rng};

/// Builds a random string of `length` characters picked from `alphabet`
pub fn random_code(alphabet: &[char], length: usize) -> String {
    if alphabet.is_empty() {
        return String::new();
    }

    let mut rng = thread_rng();

    std::iter::repeat(())
        .filter_map(|_| alphabet.choose(&mut rng))
        .take(length)
        .collect()
}

#[cfg(test)]
mod test {
    use super::random_code;

    #[test]
    fn test_random_code_uses_alphabet() {
        let alphabet: Vec<char> = "AB1".chars().collect();
        let code = random_code(&alphabet, 64);

        assert_eq!(code.chars().count(), 64);
        assert!(code.chars().all(|c| alphabet.contains(&c)));
    }
}
