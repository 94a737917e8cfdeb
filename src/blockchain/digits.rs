use std::collections::TryReserveError;

use super::hash::{Djb2, hash_bytes};

/// Reference digits of the circle constant, after the decimal point.
pub const REFERENCE_DIGITS: &str = concat!(
    "1415926535897932384626433832795028841971693993751058209749445923",
    "0781640628620899862803482534211706798214808651328230664709384460",
    "9550582231725359408128481117450284102701938521105559644622948954",
    "9303819644288109756659334461284756482337867831652712019091456485",
    "6692346034861045432664821339360726024914127372458700660631558817",
    "4881520920962829254091715364367892590360011330530548820466521384",
    "1469519415116094330572703657595919530921861173819326117931051185",
    "4807446237996274956735188575272489122793818301194912983367336244",
    "0656643086021394946395224737190702179860943702770539217176293176",
    "7523846748184676694051320005681271452635608277857713427577896091",
    "7363717872146844090122495343014654958537105079227968925892354201",
    "9956112129021960864034418159813629774771309960518707211349999998",
    "3729780499510597317328160963185950244594553469083026425223082533",
    "4468503526193118817101000313783875288658753320838142061717766914",
    "7303598253490428755468731159562863882353787593751957781857780532",
    "1712268066130019278766111959092164201989380952572010654858632788",
);

/// Floating-point approximation whose printed expansion seeds the
/// approximation strategy.
const APPROXIMATION: f64 = 3.141_592_653_589_793;

/// Extra cells carried by the spigot working array beyond the output length.
const SPIGOT_PADDING: usize = 100;

/// Generation strategy, picked once per block from `seed mod 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Base-conversion carries over a working array initialised to 2.
    SpigotLike,
    /// Printed expansion of a float, then a fixed formula on the index.
    ApproxLike,
    /// Reference table digits under a linear transform on the position.
    LinearLike,
}

impl Algorithm {
    pub const fn for_seed(seed: i64) -> Self {
        match seed.rem_euclid(3) {
            0 => Self::SpigotLike,
            1 => Self::ApproxLike,
            _ => Self::LinearLike,
        }
    }

    /// Append `length` digit values (0..=9) to `out`.
    fn fill(self, out: &mut Vec<u8>, length: usize) -> Result<(), TryReserveError> {
        out.try_reserve_exact(length)?;
        match self {
            Self::SpigotLike => spigot(out, length)?,
            Self::ApproxLike => approximation(out, length),
            Self::LinearLike => linear(out, length),
        }
        Ok(())
    }
}

fn spigot(out: &mut Vec<u8>, length: usize) -> Result<(), TryReserveError> {
    let width = length + SPIGOT_PADDING;
    let mut cells: Vec<u64> = Vec::new();
    cells.try_reserve_exact(width)?;
    cells.resize(width, 2);

    for _ in 0..length {
        let mut carry = 0u64;
        for j in (0..width).rev() {
            let divisor = 2 * j as u64 + 1;
            let temp = 10 * cells[j] + carry;
            cells[j] = temp % divisor;
            carry = temp / divisor;
        }
        out.push((carry % 10) as u8);
    }
    Ok(())
}

fn approximation(out: &mut Vec<u8>, length: usize) {
    let printed = format!("{APPROXIMATION:.15}");
    let decimals = printed
        .split_once('.')
        .map(|(_, frac)| frac.as_bytes())
        .unwrap_or_default();

    for i in 0..length {
        let digit = match decimals.get(i) {
            Some(b) => b - b'0',
            None => ((i * 31 + 17) % 10) as u8,
        };
        out.push(digit);
    }
}

fn linear(out: &mut Vec<u8>, length: usize) {
    let reference = REFERENCE_DIGITS.as_bytes();
    for i in 0..length {
        let base = match reference.get(i) {
            Some(b) => i64::from(b - b'0'),
            None => ((i * 13 + 7) % 10) as i64,
        };
        let transformed = (base * 4 - (i % 239) as i64).rem_euclid(10);
        out.push(transformed as u8);
    }
}

/// Couple a freshly generated sequence to its predecessor's stored digits.
fn chain_with(generated: &mut [u8], predecessor: &[u8], seed: i64) {
    let offset = seed.rem_euclid(10);
    for (digit, prev) in generated.iter_mut().zip(predecessor) {
        let prev = i64::from(prev.wrapping_sub(b'0') % 10);
        *digit = ((i64::from(*digit) + prev + offset) % 10) as u8;
    }
}

/// Read-only view of the predecessor block, exposing exactly what digit
/// generation needs.
#[derive(Debug, Clone, Copy)]
pub struct Parent<'a> {
    pub index: u64,
    pub nonce: u64,
    pub digits: &'a str,
}

impl Parent<'_> {
    pub const fn seed(&self) -> i64 {
        self.index.wrapping_add(self.nonce) as i64
    }
}

/// Produce `length` decimal characters derived from `seed`.
///
/// Without a predecessor the reference table is copied first and only the
/// remainder comes from the seeded strategy. With a predecessor the whole
/// sequence comes from the strategy, and every position the predecessor also
/// covers is folded with its digit and the seed. An empty predecessor (a block
/// restored from disk) contributes nothing to the fold.
pub fn generate(
    seed: i64,
    length: usize,
    predecessor: Option<&str>,
) -> Result<String, TryReserveError> {
    if length == 0 {
        return Ok(String::new());
    }

    let algorithm = Algorithm::for_seed(seed);
    let mut values: Vec<u8> = Vec::new();
    values.try_reserve_exact(length)?;

    match predecessor {
        None => {
            let reference = REFERENCE_DIGITS.as_bytes();
            let copied = length.min(reference.len());
            values.extend(reference[..copied].iter().map(|b| b - b'0'));
            if length > copied {
                algorithm.fill(&mut values, length - copied)?;
            }
        }
        Some(prev) => {
            algorithm.fill(&mut values, length)?;
            chain_with(&mut values, prev.as_bytes(), seed);
        }
    }

    let mut digits = String::new();
    digits.try_reserve_exact(length)?;
    digits.extend(values.into_iter().map(|v| char::from(b'0' + v)));
    Ok(digits)
}

/// Digits for a block mined on top of `parent` (seed 0 at genesis).
pub fn for_block(parent: Option<Parent<'_>>, length: usize) -> Result<String, TryReserveError> {
    match parent {
        Some(p) => generate(p.seed(), length, Some(p.digits)),
        None => generate(0, length, None),
    }
}

/// Check `digits` against the reference table starting at `start`.
/// Positions beyond the table cannot be checked and are accepted.
pub fn matches_reference(digits: &str, start: usize) -> bool {
    if digits.is_empty() {
        return false;
    }
    let reference = REFERENCE_DIGITS.as_bytes();
    if start >= reference.len() {
        return true;
    }
    digits
        .bytes()
        .zip(&reference[start..])
        .all(|(got, want)| got == *want)
}

/// Every character is a decimal digit and no digit's frequency strays
/// outside 0.5x..2x of a uniform distribution.
pub fn is_plausible_sequence(digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }
    let mut counts = [0usize; 10];
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            return false;
        }
        counts[usize::from(b - b'0')] += 1;
    }
    let expected = digits.len() as f64 / 10.0;
    counts.iter().all(|&c| {
        let ratio = c as f64 / expected;
        (0.5..=2.0).contains(&ratio)
    })
}

/// Fingerprint of a digit payload combined with a nonce.
pub fn digit_proof_hash(digits: &str, nonce: u64) -> u32 {
    if digits.is_empty() {
        return 0;
    }
    let mut hasher = Djb2::new();
    hasher.update(digits);
    hasher.update_display(nonce);
    hasher.finalize()
}

/// Digit-level proof: a plausible sequence of at least `difficulty` digits
/// whose fingerprint is divisible by `difficulty / 100 + 1`.
pub fn verify_digit_proof(digits: &str, difficulty: u64) -> bool {
    if !is_plausible_sequence(digits) || (digits.len() as u64) < difficulty {
        return false;
    }
    u64::from(hash_bytes(digits)) % (difficulty / 100 + 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEEDS: [i64; 8] = [i64::MIN, -7, -1, 0, 1, 2, 3, 1_000_003];

    #[test]
    fn reference_table_has_1024_digits() {
        assert_eq!(REFERENCE_DIGITS.len(), 1024);
        assert!(REFERENCE_DIGITS.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn zero_length_is_empty_for_every_variant() {
        for seed in SEEDS {
            assert_eq!(generate(seed, 0, None).unwrap(), "");
            assert_eq!(generate(seed, 0, Some("123")).unwrap(), "");
            assert_eq!(generate(seed, 0, Some("")).unwrap(), "");
        }
    }

    #[test]
    fn algorithm_selection_handles_negative_seeds() {
        assert_eq!(Algorithm::for_seed(0), Algorithm::SpigotLike);
        assert_eq!(Algorithm::for_seed(4), Algorithm::ApproxLike);
        assert_eq!(Algorithm::for_seed(5), Algorithm::LinearLike);
        assert_eq!(Algorithm::for_seed(-1), Algorithm::LinearLike);
        assert_eq!(Algorithm::for_seed(-3), Algorithm::SpigotLike);
    }

    #[test]
    fn genesis_copies_reference_prefix() {
        assert_eq!(generate(0, 2, None).unwrap(), "14");
        assert_eq!(generate(0, 10, None).unwrap(), "1415926535");
    }

    #[test]
    fn genesis_extends_past_the_table() {
        let digits = generate(0, 1030, None).unwrap();
        assert_eq!(digits.len(), 1030);
        assert_eq!(&digits[..1024], REFERENCE_DIGITS);
        assert!(digits.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn approximation_variant() {
        // seed 1 -> ApproxLike; empty predecessor leaves it untouched
        assert_eq!(generate(1, 20, Some("")).unwrap(), "14159265358979323456");
    }

    #[test]
    fn linear_variant() {
        assert_eq!(generate(2, 4, Some("")).unwrap(), "4527");
    }

    #[test]
    fn spigot_variant_is_decimal_and_deterministic() {
        let a = generate(3, 64, Some("")).unwrap();
        let b = generate(3, 64, Some("")).unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert!(a.bytes().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn predecessor_digits_are_folded_in() {
        // ApproxLike "1415" + 9 + 4 at each position
        assert_eq!(generate(4, 4, Some("9999")).unwrap(), "4748");
        // only the overlapping prefix is folded
        assert_eq!(generate(4, 4, Some("00")).unwrap(), "5815");
    }

    #[test]
    fn negative_seed_folds_with_euclidean_remainder() {
        assert_eq!(generate(-5, 8, Some("12345678")).unwrap(), "71949388");
    }

    #[test]
    fn same_parent_gives_same_digits() {
        let prev = generate(0, 8, None).unwrap();
        let parent = Parent {
            index: 2,
            nonce: 5,
            digits: &prev,
        };
        let a = for_block(Some(parent), 16).unwrap();
        let b = for_block(Some(parent), 16).unwrap();
        assert_eq!(a, b);
        assert_eq!(parent.seed(), 7);
    }

    #[test]
    fn reference_matching() {
        assert!(matches_reference("14159", 0));
        assert!(matches_reference("5926", 3));
        assert!(!matches_reference("00000", 0));
        assert!(matches_reference("00000", 5000));
        assert!(!matches_reference("", 0));
    }

    #[test]
    fn plausibility() {
        assert!(is_plausible_sequence(REFERENCE_DIGITS));
        assert!(!is_plausible_sequence("1111111111"));
        assert!(!is_plausible_sequence("12a4"));
        assert!(!is_plausible_sequence(""));
    }

    #[test]
    fn digit_proof_hash_mixes_nonce() {
        assert_eq!(digit_proof_hash("", 9), 0);
        assert_eq!(digit_proof_hash("1415", 9), hash_bytes("14159"));
        assert_ne!(digit_proof_hash("1415", 1), digit_proof_hash("1415", 2));
    }

    #[test]
    fn digit_proof_requires_enough_digits() {
        assert!(!verify_digit_proof(REFERENCE_DIGITS, 2048));
        // divisor is 1 below difficulty 100
        assert!(verify_digit_proof(REFERENCE_DIGITS, 64));
    }

    #[test]
    fn unallocatable_length_is_an_error() {
        assert!(generate(0, usize::MAX, None).is_err());
        assert!(generate(1, usize::MAX / 2, Some("")).is_err());
    }
}
