use std::path::Path;

use anyhow::Result;

use metab_pack::data::loader::save_file;
use metab_pack::data::model::{list, mapping, Molecule, MoleculeMap, Peak, Spectrum};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

/// Round to four decimals so the table reads like instrument output.
fn round4(x: f64) -> f64 {
    (x * 1e4).round() / 1e4
}

/// Fragment ladder below the parent mass with a falling intensity envelope.
fn fragment_peaks(parent_mass: f64, n: usize, spectrum_id: &str, rng: &mut SimpleRng) -> Vec<Peak> {
    (0..n)
        .map(|i| {
            let mz = round4(parent_mass * (0.2 + 0.8 * rng.next_f64()));
            let intensity = round4(100.0 * (-(i as f64) / n as f64).exp() * (0.5 + rng.next_f64()));
            Peak::new(mz, intensity)
                .with_id(format!("{}", 1000 + i))
                .with_ms_ms_id(spectrum_id)
        })
        .collect()
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let taxa: [(&str, &str, Option<&str>); 3] = [
        ("Organic compounds", "Carboxylic acids and derivatives", Some("Amino acids, peptides, and analogues")),
        ("Organic compounds", "Organooxygen compounds", Some("Carbohydrates and carbohydrate conjugates")),
        ("Organic compounds", "Fatty Acyls", None),
    ];
    let modes = ["Positive", "Negative"];
    let biofluids = ["Blood", "Urine", "Saliva", "Feces"];

    let mut molecules = MoleculeMap::new();
    let mut spectrum_no = 0usize;
    for i in 0..12 {
        let key = format!("SAMPLEKEY{:04}-XYZABC-N", i);
        let (kingdom, class, sub_class) = taxa[i % taxa.len()];
        let parent_mass = round4(80.0 + 400.0 * rng.next_f64());

        let mut molecule = Molecule::new()
            .with("accession", format!("HMDB{:07}", 1 + i))
            .with("name", format!("Synthetic metabolite {i}"))
            .with("monisotopic_molecular_weight", parent_mass.to_string())
            .with(
                "taxonomy",
                mapping([
                    ("kingdom", Some(kingdom)),
                    ("class", Some(class)),
                    ("sub_class", sub_class),
                ]),
            )
            .with(
                "biofluid_locations",
                list(biofluids[..1 + rng.below(biofluids.len())].iter().copied()),
            );

        for j in 0..rng.below(4) {
            spectrum_no += 1;
            let spectrum_id = format!("{}", 5000 + spectrum_no);
            let n_peaks = 2 + rng.below(10);
            molecule = molecule.with_spectrum(
                Spectrum::new()
                    .with("id", spectrum_id.as_str())
                    .with("ionization_mode", modes[(i + j) % modes.len()])
                    .with("collision_energy_voltage", "20")
                    .with("peaks", fragment_peaks(parent_mass, n_peaks, &spectrum_id, &mut rng)),
            );
        }
        molecules.insert(key, molecule);
    }

    let output_path = Path::new("sample_packed.csv");
    save_file(output_path, &molecules)?;

    println!(
        "Wrote {} molecules ({} spectra) to {}",
        molecules.len(),
        spectrum_no,
        output_path.display()
    );
    Ok(())
}
