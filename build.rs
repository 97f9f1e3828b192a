// The sender/receiver pages and their static assets are embedded with
// rust-embed, so rebuild whenever any of them change.

fn main() {
    for dir in ["templates/", "src/assets/"] {
        println!("cargo:rerun-if-changed={dir}");
    }
}
