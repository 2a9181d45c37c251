pub mod bam;
pub mod cpa;
pub mod taint;
