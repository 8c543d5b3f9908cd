pub mod assignment;
pub mod deconvolution;
pub mod design;
pub mod params;
pub mod peptide;
pub mod readout;
