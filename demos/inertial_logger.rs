#![no_std]
#![no_main]

use inertial_sampler::Config;
use vexide::prelude::*;

#[vexide::main]
async fn main(p: Peripherals) {
    let config = match Config::from_json(include_str!("../config/inertial.json")) {
        Ok(config) => config,
        Err(err) => {
            println!("bad configuration: {err}");
            return;
        }
    };

    if let Err(err) = inertial_sampler::v5::run(p, config).await {
        println!("{err}");
    }
}
