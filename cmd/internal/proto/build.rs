fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::compile_protos("proto/metastore.proto")?;
    tonic_build::compile_protos("proto/blockstore.proto")?;
    println!("cargo:rerun-if-changed=proto");
    Ok(())
}
