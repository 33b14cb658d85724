fn main() {
    cc::Build::new()
        .file("csrc/banded_sw.c")
        .opt_level(3)
        .flag_if_supported("-funroll-loops")
        .warnings(true)
        .compile("seqhunter_banded_sw");
    println!("cargo:rerun-if-changed=csrc/banded_sw.c");
    println!("cargo:rerun-if-changed=csrc/banded_sw.h");
}
