use foxj::{checker_main, FileCmp};

fn main() {
  checker_main(&FileCmp)
}
