//! Decode a scripted model and print the winning token sequence.
//!
//! Run with `cargo run --example scripted_decode`.

use sheaf::prelude::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = BeamSearchConfig {
        beam_size: 2,
        max_dec_steps: 10,
        min_dec_steps: 1,
        start_token: 2,
        stop_token: 3,
        n_reserved: 4,
        pointer_gen: false,
        mode: ScoreMode::Plain,
    };
    let decoder = Decoder::builder().search(config).build()?;

    // Four candidates per step (2 * beam_size); the stop token becomes
    // the top candidate on the third step.
    let mut model = ScriptedDecoder::new(
        vec![
            vec![(10, -0.1), (11, -0.3), (12, -0.7), (13, -1.2)],
            vec![(11, -0.2), (12, -0.4), (13, -0.9), (14, -1.5)],
            vec![(3, -0.1), (12, -0.5), (13, -1.0), (14, -1.8)],
        ],
        6,
    );

    let result = decoder.decode_one(&mut model, &SearchInput::new(0, 6))?;
    println!(
        "tokens: {:?}  score: {:.4}",
        result.best.tokens(),
        result.score
    );
    Ok(())
}
