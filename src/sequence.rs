use phf::phf_map;

static COMPLEMENT: phf::Map<char, char> = phf_map! {
    'a' => 't',
    't' => 'a',
    'c' => 'g',
    'g' => 'c',
};

static NUCLEOTIDE_INDEX: phf::Map<char, usize> = phf_map! {
    'a' => 0,
    'c' => 1,
    'g' => 2,
    't' => 3,
};

/// Column of a nucleotide in a probability matrix (A, C, G, T order).
///
/// Case-insensitive. Returns `None` for anything else, such as `N`.
pub fn nucleotide_index(base: char) -> Option<usize> {
    NUCLEOTIDE_INDEX.get(&base.to_ascii_lowercase()).copied()
}

/// Generates the reverse complement of a DNA sequence.
///
/// # Arguments
/// * `sequence` - Input DNA sequence string, in any case
///
/// # Returns
/// * `String` - The lowercase reverse complement where:
///   - a ↔ t
///   - c ↔ g
///   - any other character is kept as is, at its mirrored position
pub fn reverse_complement(sequence: &str) -> String {
    sequence
        .chars()
        .rev()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            COMPLEMENT.get(&c).copied().unwrap_or(c)
        })
        .collect()
}

/// Extracts the sequence from FASTA-formatted text such as `samtools faidx` output.
///
/// Header lines starting with '>' are dropped, the remaining lines are joined
/// and the result is lowercased.
pub fn parse_faidx_output(text: &str) -> String {
    let mut sequence = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('>') || line.is_empty() {
            continue;
        }
        sequence.push_str(line);
    }
    sequence.to_lowercase()
}
