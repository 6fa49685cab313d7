use anyhow::Result;
use pkgraph_lib::router::SubrequestInfo;

use crate::output::{print_json, print_row};

pub fn cmd_describe(json: bool) -> Result<()> {
  let supported = SubrequestInfo::supported();
  if json {
    return print_json(&supported);
  }
  let width = supported.iter().map(|s| s.name.len()).max().unwrap_or(0);
  for info in &supported {
    print_row(" ", &info.name, width, &format!("{} (v{})", info.description, info.version));
  }
  Ok(())
}
