use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=ORACLE_ENCODING");

    let encoding = match env::var("ORACLE_ENCODING").as_deref() {
        Err(_) | Ok("binary") => "Binary",
        Ok("hex") => "Hex",
        Ok(other) => panic!("ORACLE_ENCODING must be `binary` or `hex`, not `{}`", other),
    };

    let values = format!(
        "/// Wire encoding selected with `ORACLE_ENCODING` at build time\n\
         const ENCODING: Encoding = Encoding::{};\n",
        encoding
    );

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(out_path.join("values.rs"), values).expect("Couldn't write build values!");
}
