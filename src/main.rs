use std::fs::read_to_string;

use transport::Input;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .ok_or("Usage: <program> <instance.yaml>")?;

    let buf = read_to_string(path)?;
    let input: Input = serde_yaml::from_str(&buf)?;
    let solution = input.solve()?;

    println!("{}", serde_yaml::to_string(&solution)?);
    Ok(())
}
