use nanomodem_modem::{ModemModel, ModemRegistry};
use serde::Serialize;

use crate::cmd::ModelsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct ModelEntry {
    model: ModemModel,
    registered: bool,
}

#[derive(Serialize)]
struct ModelsOutput {
    models: Vec<ModelEntry>,
}

pub fn run(_args: ModelsArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = ModemRegistry::with_builtin();
    let out = ModelsOutput {
        models: ModemModel::ALL
            .into_iter()
            .filter(|model| *model != ModemModel::Unknown)
            .map(|model| ModelEntry {
                model,
                registered: registry.contains(model),
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Pretty => {
            for entry in &out.models {
                println!("{} registered={}", entry.model, entry.registered);
            }
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["MODEL", "REGISTERED"]);
            for entry in &out.models {
                table.add_row(vec![entry.model.to_string(), entry.registered.to_string()]);
            }
            println!("{table}");
        }
    }
    Ok(SUCCESS)
}
